//! Personal reminders delivered by direct message.

pub mod parsers;

use super::{parse_int, Command, CommandBase, CommandPlugin};
use crate::chat::{react_fail, react_success, Embed};
use crate::core::channels::{ExecContext, PulseMessage, PULSE};
use crate::core::plugin::{InitOptions, Plugin};
use crate::core::registry::{BusError, RegistryExt};
use crate::db::{format_timestamp, parse_timestamp, ReminderRecord};
use crate::help::{build_help, HelpSpec};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serenity::model::channel::Message;
use serenity::model::id::UserId;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use parsers::{parse_reminder, ParseResult};

const MAX_REMINDER_CHARS: usize = 250;
const VALID_SUBCOMMANDS: &str = "`add`, `rm`, `list`, `help`";
const INVALID_NUMBER: &str = "Invalid reminder number. Check again with the `reminder list` command!";
pub const DELIVERY_COLOR: u32 = 2258916;

pub struct Reminder {
    base: CommandBase,
}

pub fn create(options: &InitOptions) -> Option<Arc<dyn Plugin>> {
    CommandPlugin::boxed(Reminder {
        base: CommandBase::new(options),
    })
}

/// Short display form, e.g. `Jan 1, 2020 1:28 PM`.
pub fn format_display(at: DateTime<Utc>) -> String {
    at.format("%b %-d, %Y %-I:%M %p").to_string()
}

/// Rough distance from `now` to `at`, e.g. `in 3 days` or `2 hours ago`.
pub fn from_now(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = at.signed_duration_since(now);
    let secs = delta.num_seconds().unsigned_abs();
    let minutes = (secs as f64 / 60.0).round() as u64;
    let hours = (secs as f64 / 3_600.0).round() as u64;
    let days = (secs as f64 / 86_400.0).round() as u64;

    let span = match secs {
        0..45 => "a few seconds".to_string(),
        45..90 => "a minute".to_string(),
        90..2_700 => format!("{} minutes", minutes),
        2_700..5_400 => "an hour".to_string(),
        5_400..79_200 => format!("{} hours", hours),
        79_200..129_600 => "a day".to_string(),
        129_600..2_246_400 => format!("{} days", days),
        2_246_400..3_888_000 => "a month".to_string(),
        3_888_000..27_648_000 => format!("{} months", (days as f64 / 30.4).round() as u64),
        27_648_000..47_347_200 => "a year".to_string(),
        _ => format!("{} years", (days as f64 / 365.25).round() as u64),
    };

    if delta.num_seconds() < 0 {
        format!("{} ago", span)
    } else {
        format!("in {}", span)
    }
}

fn delivery_embed(reminder: &ReminderRecord) -> Embed {
    Embed::new()
        .description(format!(
            "_This is an automated reminder\nCreated with [this message]({})._",
            reminder.reminder_url
        ))
        .color(DELIVERY_COLOR)
}

impl Reminder {
    async fn add(&self, ctx: &ExecContext, now: DateTime<Utc>) -> anyhow::Result<()> {
        let client = self.base.client();
        let query = ctx.args.get(1..).unwrap_or_default().join(" ");

        let Some(ParseResult { date_time, reminder }) = parse_reminder(&query, now) else {
            react_fail(
                client,
                ctx.msg.channel_id,
                ctx.msg.id,
                Some("Your syntax is incorrect. Check the command help and try again!"),
            )
            .await;
            return Ok(());
        };

        let length = reminder.chars().count();
        if length > MAX_REMINDER_CHARS {
            let reply = format!(
                "Your reminder is too long. It has {} characters, but should not exceed {}!",
                length, MAX_REMINDER_CHARS
            );
            react_fail(client, ctx.msg.channel_id, ctx.msg.id, Some(&reply)).await;
            return Ok(());
        }

        let user_id = ctx.msg.author.id.to_string();
        let url = ctx.msg.link();
        let due = format_timestamp(date_time);
        let id = ctx
            .store
            .run_blocking(move |db| db.create_reminder(&user_id, &reminder, &due, &url))
            .await?;
        debug!("Reminder {} added by {}", id, ctx.msg.author.id);

        let reply = format!(
            "Your reminder has been added! I'll notify you about it at {} UTC - _{}_!",
            format_display(date_time),
            from_now(date_time, now)
        );
        react_success(client, ctx.msg.channel_id, ctx.msg.id, Some(&reply)).await;
        Ok(())
    }

    async fn remove(&self, ctx: &ExecContext) -> anyhow::Result<()> {
        let client = self.base.client();
        let number = ctx.args.get(1).and_then(|arg| parse_int(arg));
        let Some(number) = number else {
            react_fail(client, ctx.msg.channel_id, ctx.msg.id, Some(INVALID_NUMBER)).await;
            return Ok(());
        };

        let user_id = ctx.msg.author.id.to_string();
        let all = ctx
            .store
            .run_blocking(move |db| db.list_reminders_for_user(&user_id))
            .await?;

        // Numbers are 1-based; `0` and negatives fold onto the list like `abs(n - 1)`.
        let index = (number - 1).unsigned_abs() as usize;
        let Some(target) = all.get(index) else {
            react_fail(client, ctx.msg.channel_id, ctx.msg.id, Some(INVALID_NUMBER)).await;
            return Ok(());
        };

        let id = target.id;
        let deleted = ctx.store.run_blocking(move |db| db.delete_reminder(id)).await?;
        if deleted == 0 {
            react_fail(
                client,
                ctx.msg.channel_id,
                ctx.msg.id,
                Some("Something went wrong."),
            )
            .await;
            return Ok(());
        }

        react_success(client, ctx.msg.channel_id, ctx.msg.id, None).await;
        Ok(())
    }

    async fn list(&self, ctx: &ExecContext) -> anyhow::Result<()> {
        let client = self.base.client();
        let user_id = ctx.msg.author.id.to_string();
        let all = ctx
            .store
            .run_blocking(move |db| db.list_reminders_for_user(&user_id))
            .await?;

        if all.is_empty() {
            return client
                .send_message(ctx.msg.channel_id, "You currently don't have any reminders.")
                .await;
        }

        let embed = all.iter().enumerate().fold(
            Embed::new()
                .title("Your reminders")
                .description("All times shown in UTC.\n\n"),
            |embed, (i, reminder)| {
                let when = parse_timestamp(&reminder.reminder_at)
                    .map(format_display)
                    .unwrap_or_else(|| reminder.reminder_at.clone());
                embed.field(format!("**{}** - _{}_", i + 1, when), &reminder.reminder, false)
            },
        );
        client.send_embed(ctx.msg.channel_id, embed).await
    }

    /// Remove every reminder due at `now` and notify its owner.
    pub async fn deliver_due(&self, pulse: PulseMessage, now: DateTime<Utc>) -> anyhow::Result<()> {
        let cutoff = format_timestamp(now);
        let due = pulse
            .store
            .run_blocking(move |db| db.get_due_reminders(&cutoff))
            .await?;
        if due.is_empty() {
            return Ok(());
        }

        let ids: Vec<i64> = due.iter().map(|r| r.id).collect();
        pulse
            .store
            .run_blocking(move |db| db.delete_reminders(&ids))
            .await?;
        info!("Delivering {} due reminder(s)", due.len());

        for reminder in &due {
            let Ok(user_id) = reminder.user_id.parse::<u64>() else {
                warn!("Reminder {} has an invalid user id {}", reminder.id, reminder.user_id);
                continue;
            };
            if let Err(e) = pulse
                .chat_client
                .direct_message(
                    UserId::new(user_id),
                    &format!("{}\n", reminder.reminder),
                    Some(delivery_embed(reminder)),
                )
                .await
            {
                warn!("Failed to deliver reminder {}: {}", reminder.id, e);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Command for Reminder {
    fn trigger(&self) -> &str {
        "reminder"
    }

    fn base(&self) -> &CommandBase {
        &self.base
    }

    async fn exec(&self, ctx: ExecContext) -> anyhow::Result<()> {
        match ctx.args.first().map(String::as_str) {
            None | Some("help") => self.send_help(ctx.msg).await,
            Some("add") => self.add(&ctx, Utc::now()).await,
            Some("rm") => self.remove(&ctx).await,
            Some("list") => self.list(&ctx).await,
            Some(_) => {
                self.base
                    .client()
                    .send_message(
                        ctx.msg.channel_id,
                        &format!("Invalid subcommand. Try: {}", VALID_SUBCOMMANDS),
                    )
                    .await
            }
        }
    }

    async fn send_help(&self, msg: Message) -> anyhow::Result<()> {
        let t = self.trigger();
        let prefix = self.base.prefix();
        let embed = build_help(
            HelpSpec {
                title: t,
                description: "Manage personal reminders.",
                commands: vec![
                    (format!("{t} list"), "View your reminders.".to_string()),
                    (
                        format!("{t} rm <reminder number>"),
                        "Remove a reminder (get the number with `list`).".to_string(),
                    ),
                    (
                        format!("{t} add Some reminder text <time>"),
                        format!(
                            "Add a new reminder \"Some reminder text\" for the given time. \
                             The reverse also works - you can do \
                             `{prefix}{t} add <time> Some reminder text`"
                        ),
                    ),
                ],
                additional: vec![(
                    "⏲️ Valid input examples".to_string(),
                    "Valid input examples for the <time> value are `in 17 minutes`, \
                     `in 1 hour`, `in 3 days`, `on January 1`, `on March 4th`, `on 9 Feb`, \
                     `on 30.11.2020` (DD.MM.YYYY), `on 14.02` (DD.MM), `on Thursday`, \
                     `on Wed`, `on friday`, etc."
                        .to_string(),
                )],
            },
            prefix,
        );
        self.base.client().send_embed(msg.channel_id, embed).await
    }

    fn on_wire(self: Arc<Self>, options: &InitOptions) -> Result<(), BusError> {
        let pulse = options.registry.subject(&PULSE)?;
        pulse.subscribe_async(move |message| {
            let this = self.clone();
            async move { this.deliver_due(message, Utc::now()).await }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{FAIL_EMOJI, SUCCESS_EMOJI};
    use crate::testing::{mock_message, mock_user, test_options, Action};
    use chrono::{Duration, TimeZone};

    fn ctx(options: &InitOptions, content: &str) -> ExecContext {
        ExecContext {
            msg: mock_message(3, 10, mock_user(1, "alice", false), content),
            store: options.store.clone(),
            args: content.split(' ').skip(1).map(str::to_string).collect(),
        }
    }

    fn reminder(options: &InitOptions) -> Reminder {
        Reminder {
            base: CommandBase::new(options),
        }
    }

    #[test]
    fn test_from_now() {
        let now = Utc.with_ymd_and_hms(2020, 1, 1, 13, 28, 14).unwrap();
        assert_eq!(from_now(now + Duration::minutes(17), now), "in 17 minutes");
        assert_eq!(from_now(now + Duration::days(3), now), "in 3 days");
        assert_eq!(from_now(now + Duration::seconds(10), now), "in a few seconds");
        assert_eq!(from_now(now - Duration::hours(2), now), "2 hours ago");
        assert_eq!(from_now(now + Duration::days(365 * 6), now), "in 6 years");
    }

    #[tokio::test]
    async fn test_add_and_list() {
        let (options, chat) = test_options();
        let cmd = reminder(&options);
        let now = Utc.with_ymd_and_hms(2020, 1, 1, 13, 28, 14).unwrap();

        cmd.add(&ctx(&options, "!reminder add pickup milk in 17 minutes"), now)
            .await
            .unwrap();

        let stored = options.store.list_reminders_for_user("1").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].reminder, "pickup milk");
        assert_eq!(stored[0].reminder_at, "2020-01-01 13:45:14");
        assert_eq!(stored[0].reminder_url, "https://discord.com/channels/@me/10/3");
        assert_eq!(
            chat.actions(),
            vec![
                Action::React(10, 3, SUCCESS_EMOJI.to_string()),
                Action::Send(
                    10,
                    "Your reminder has been added! I'll notify you about it at \
                     Jan 1, 2020 1:45 PM UTC - _in 17 minutes_!"
                        .to_string()
                ),
            ]
        );

        cmd.exec(ctx(&options, "!reminder list")).await.unwrap();
        let actions = chat.actions();
        let Action::Embed(10, embed) = &actions[2] else {
            panic!("expected the reminder list");
        };
        assert_eq!(embed.title.as_deref(), Some("Your reminders"));
        assert_eq!(embed.fields[0].name, "**1** - _Jan 1, 2020 1:45 PM_");
        assert_eq!(embed.fields[0].value, "pickup milk");
    }

    #[tokio::test]
    async fn test_add_rejects_bad_syntax_and_long_text() {
        let (options, chat) = test_options();
        let cmd = reminder(&options);

        cmd.exec(ctx(&options, "!reminder add whenever")).await.unwrap();
        let long = format!("!reminder add {} in 3 days", "x".repeat(251));
        cmd.exec(ctx(&options, &long)).await.unwrap();

        assert_eq!(
            chat.actions(),
            vec![
                Action::React(10, 3, FAIL_EMOJI.to_string()),
                Action::Send(
                    10,
                    "Your syntax is incorrect. Check the command help and try again!".to_string()
                ),
                Action::React(10, 3, FAIL_EMOJI.to_string()),
                Action::Send(
                    10,
                    "Your reminder is too long. It has 251 characters, but should not exceed 250!"
                        .to_string()
                ),
            ]
        );
        assert!(options.store.list_reminders_for_user("1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_by_list_number() {
        let (options, chat) = test_options();
        let cmd = reminder(&options);
        let store = &options.store;
        store.create_reminder("1", "later", "2030-01-02 00:00:00", "u").unwrap();
        store.create_reminder("1", "sooner", "2030-01-01 00:00:00", "u").unwrap();

        cmd.exec(ctx(&options, "!reminder rm 1")).await.unwrap();
        cmd.exec(ctx(&options, "!reminder rm 7")).await.unwrap();
        cmd.exec(ctx(&options, "!reminder rm")).await.unwrap();

        let left = store.list_reminders_for_user("1").unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].reminder, "later");
        assert_eq!(
            chat.actions(),
            vec![
                Action::React(10, 3, SUCCESS_EMOJI.to_string()),
                Action::React(10, 3, FAIL_EMOJI.to_string()),
                Action::Send(10, INVALID_NUMBER.to_string()),
                Action::React(10, 3, FAIL_EMOJI.to_string()),
                Action::Send(10, INVALID_NUMBER.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_list_without_reminders() {
        let (options, chat) = test_options();
        reminder(&options)
            .exec(ctx(&options, "!reminder list"))
            .await
            .unwrap();

        assert_eq!(
            chat.actions(),
            vec![Action::Send(10, "You currently don't have any reminders.".to_string())]
        );
    }

    #[tokio::test]
    async fn test_invalid_subcommand() {
        let (options, chat) = test_options();
        reminder(&options)
            .exec(ctx(&options, "!reminder snooze"))
            .await
            .unwrap();

        assert_eq!(
            chat.actions(),
            vec![Action::Send(
                10,
                "Invalid subcommand. Try: `add`, `rm`, `list`, `help`".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_deliver_due_sends_and_deletes() {
        let (options, chat) = test_options();
        let cmd = reminder(&options);
        let store = &options.store;
        store
            .create_reminder("7", "stretch", "2020-01-01 12:00:00", "https://x/1")
            .unwrap();
        store
            .create_reminder("7", "not yet", "2020-01-02 12:00:00", "https://x/2")
            .unwrap();

        let now = Utc.with_ymd_and_hms(2020, 1, 1, 13, 0, 0).unwrap();
        cmd.deliver_due(
            PulseMessage {
                store: store.clone(),
                chat_client: options.client.clone(),
            },
            now,
        )
        .await
        .unwrap();

        assert_eq!(
            chat.actions(),
            vec![Action::Direct(
                7,
                "stretch\n".to_string(),
                Some(
                    Embed::new()
                        .description(
                            "_This is an automated reminder\nCreated with [this message](https://x/1)._"
                        )
                        .color(DELIVERY_COLOR)
                ),
            )]
        );
        let left = store.list_reminders_for_user("7").unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].reminder, "not yet");
    }

    #[tokio::test]
    async fn test_pulse_delivers_due_reminders() {
        let (options, chat) = test_options();
        Arc::new(crate::plugins::Pulse::with_interval(
            std::time::Duration::from_millis(20),
        ))
        .wire(&options)
        .unwrap();
        create(&options).unwrap().wire(&options).unwrap();
        options
            .store
            .create_reminder("7", "stretch", "2000-01-01 00:00:00", "https://x/1")
            .unwrap();

        let actions = chat.wait_for(1).await;
        assert!(matches!(
            &actions[..],
            [Action::Direct(7, text, Some(_))] if text == "stretch\n"
        ));
        assert!(options.store.list_reminders_for_user("7").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wiring_requires_pulse() {
        let (options, _chat) = test_options();
        let err = create(&options).unwrap().wire(&options).err().unwrap();
        assert_eq!(err, BusError::ChannelNotFound("pulse".to_string()));
    }
}
