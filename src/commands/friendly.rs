use super::{Command, CommandBase, CommandPlugin};
use crate::chat::{react_fail, react_success, Embed};
use crate::core::channels::ExecContext;
use crate::core::plugin::{InitOptions, Plugin};
use crate::db::parse_timestamp;
use crate::help::{build_help, HelpSpec};
use async_trait::async_trait;
use serenity::model::channel::Message;
use serenity::model::id::{GuildId, UserId};
use std::sync::Arc;

const AUTHOR: &str = "me";
const VALID_SUBCOMMANDS: &str = "`add`, `stats`";
const TOP_KILLERS: usize = 3;
pub const STATS_COLOR: u32 = 15158332;

/// Tally of accidental friend murder.
pub struct Friendly {
    base: CommandBase,
}

pub fn create(options: &InitOptions) -> Option<Arc<dyn Plugin>> {
    CommandPlugin::boxed(Friendly {
        base: CommandBase::new(options),
    })
}

/// User id from a `<@123>` or `<@!123>` mention.
pub fn parse_mention(arg: &str) -> Option<UserId> {
    let inner = arg.strip_prefix("<@")?.strip_suffix('>')?;
    let digits = inner.strip_prefix('!').unwrap_or(inner);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u64>().ok().filter(|id| *id != 0).map(UserId::new)
}

/// Who an `add` argument names, or the reason it names nobody.
fn resolve_party(arg: &str, author: UserId, role: &str) -> Result<UserId, String> {
    if arg == AUTHOR {
        return Ok(author);
    }
    parse_mention(arg).ok_or_else(|| format!("{} is not a valid mention.", role))
}

impl Friendly {
    async fn add(&self, ctx: &ExecContext) -> anyhow::Result<()> {
        let client = self.base.client();
        let (channel_id, message_id) = (ctx.msg.channel_id, ctx.msg.id);
        let author = ctx.msg.author.id;

        let parties = match (ctx.args.get(1), ctx.args.get(2)) {
            (None, _) => Err("Killer missing. Mention someone or use \"me\"!".to_string()),
            (Some(_), None) => Err("Victim missing. Mention someone or use \"me\"!".to_string()),
            (Some(killer), Some(victim)) => resolve_party(killer, author, "Killer")
                .and_then(|k| resolve_party(victim, author, "Victim").map(|v| (k, v))),
        };
        let (killer, victim) = match parties {
            Ok(parties) => parties,
            Err(reason) => {
                react_fail(client, channel_id, message_id, Some(&reason)).await;
                return Ok(());
            }
        };

        let bot = client.current_user_id();
        if bot.is_some_and(|bot| bot == killer || bot == victim) {
            react_fail(client, channel_id, message_id, Some("Don't involve me in this")).await;
            return Ok(());
        }
        if killer == victim {
            react_fail(client, channel_id, message_id, Some("Suicides don't count.")).await;
            return Ok(());
        }

        let (killer, victim) = (killer.to_string(), victim.to_string());
        ctx.store
            .run_blocking(move |db| db.record_friendly_fire(&killer, &victim))
            .await?;
        react_success(client, channel_id, message_id, None).await;
        Ok(())
    }

    async fn user_name(&self, guild_id: Option<GuildId>, id: &str) -> String {
        match id.parse::<u64>() {
            Ok(id) if id != 0 => {
                self.base
                    .client()
                    .display_name(guild_id, UserId::new(id))
                    .await
            }
            _ => "Unknown".to_string(),
        }
    }

    async fn stats(&self, ctx: &ExecContext) -> anyhow::Result<()> {
        let client = self.base.client();
        let guild_id = ctx.msg.guild_id;
        let stats = ctx
            .store
            .run_blocking(|db| db.friendly_fire_stats(TOP_KILLERS))
            .await?;

        let Some(latest) = stats.latest else {
            return client
                .send_message(ctx.msg.channel_id, "No friendly fire recorded yet. Lucky you!")
                .await;
        };

        let mut killers = Vec::with_capacity(stats.top_killers.len());
        for (i, (killer, kills)) in stats.top_killers.iter().enumerate() {
            killers.push(format!("{}. {} - {}", i + 1, self.user_name(guild_id, killer).await, kills));
        }

        let when = parse_timestamp(&latest.created_at)
            .map(|at| at.format("%b %-d, %Y").to_string())
            .unwrap_or(latest.created_at.clone());
        let latest_text = format!(
            "{} killed {} on {}",
            self.user_name(guild_id, &latest.killer_id).await,
            self.user_name(guild_id, &latest.victim_id).await,
            when
        );

        let mut embed = Embed::new()
            .title("Friendly fire stats")
            .color(STATS_COLOR)
            .field("Top friend killers", killers.join("\n"), false)
            .field("Latest accident", latest_text, false);

        if let Some((killer, victim, kills)) = &stats.top_pair {
            embed = embed.field(
                "Most frequent",
                format!(
                    "{} has killed {} {} time(s)",
                    self.user_name(guild_id, killer).await,
                    self.user_name(guild_id, victim).await,
                    kills
                ),
                false,
            );
        }

        client.send_embed(ctx.msg.channel_id, embed).await
    }
}

#[async_trait]
impl Command for Friendly {
    fn trigger(&self) -> &str {
        "friendly"
    }

    fn base(&self) -> &CommandBase {
        &self.base
    }

    async fn exec(&self, ctx: ExecContext) -> anyhow::Result<()> {
        let reply = match ctx.args.first().map(String::as_str) {
            Some("add") => return self.add(&ctx).await,
            Some("stats") => return self.stats(&ctx).await,
            None => format!("Missing sub command, try: {}!", VALID_SUBCOMMANDS),
            Some(_) => format!("Invalid subcommand. Try: {}", VALID_SUBCOMMANDS),
        };
        self.base
            .client()
            .send_message(ctx.msg.channel_id, &reply)
            .await
    }

    async fn send_help(&self, msg: Message) -> anyhow::Result<()> {
        let t = self.trigger();
        let embed = build_help(
            HelpSpec {
                title: t,
                description: "Keeps track of accidental friend murder 🙃",
                commands: vec![
                    (
                        format!("{t} add me @VictimNick"),
                        "Adds you as the killer of VictimNick.".to_string(),
                    ),
                    (
                        format!("{t} add @KillerNick me"),
                        "Adds you as the victim of KillerNick.".to_string(),
                    ),
                    (
                        format!("{t} add @KillerNick @VictimNick"),
                        "Adds KillerNick as the killer of VictimNick.".to_string(),
                    ),
                    (
                        format!("{t} stats"),
                        "Lists the top friend killers, the latest \"accident\", and who has killed who the most."
                            .to_string(),
                    ),
                ],
                ..Default::default()
            },
            self.base.prefix(),
        );
        self.base.client().send_embed(msg.channel_id, embed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{FAIL_EMOJI, SUCCESS_EMOJI};
    use crate::testing::{mock_message, mock_user, test_options, Action};

    async fn run(options: &InitOptions, cmd: &Friendly, content: &str) {
        cmd.exec(ExecContext {
            msg: mock_message(3, 10, mock_user(1, "alice", false), content),
            store: options.store.clone(),
            args: content.split(' ').skip(1).map(str::to_string).collect(),
        })
        .await
        .unwrap();
    }

    #[test]
    fn test_parse_mention() {
        assert_eq!(parse_mention("<@123>"), Some(UserId::new(123)));
        assert_eq!(parse_mention("<@!456>"), Some(UserId::new(456)));
        assert_eq!(parse_mention("@bob"), None);
        assert_eq!(parse_mention("<@>"), None);
        assert_eq!(parse_mention("<#123>"), None);
    }

    #[tokio::test]
    async fn test_add_validation() {
        let (options, chat) = test_options();
        let cmd = Friendly {
            base: CommandBase::new(&options),
        };

        for content in [
            "!friendly add",
            "!friendly add me",
            "!friendly add bob me",
            "!friendly add me bob",
            "!friendly add me <@999>",
            "!friendly add <@1> me",
        ] {
            run(&options, &cmd, content).await;
        }

        let expected = [
            "Killer missing. Mention someone or use \"me\"!",
            "Victim missing. Mention someone or use \"me\"!",
            "Killer is not a valid mention.",
            "Victim is not a valid mention.",
            "Don't involve me in this",
            "Suicides don't count.",
        ];
        let expected: Vec<Action> = expected
            .iter()
            .flat_map(|text| {
                [
                    Action::React(10, 3, FAIL_EMOJI.to_string()),
                    Action::Send(10, text.to_string()),
                ]
            })
            .collect();
        assert_eq!(chat.actions(), expected);
        assert!(options.store.friendly_fire_stats(3).unwrap().latest.is_none());
    }

    #[tokio::test]
    async fn test_add_and_stats() {
        let (options, chat) = test_options();
        chat.set_name(1, "alice");
        chat.set_name(2, "bob");
        let cmd = Friendly {
            base: CommandBase::new(&options),
        };

        run(&options, &cmd, "!friendly add me <@2>").await;
        run(&options, &cmd, "!friendly add <@!2> me").await;
        run(&options, &cmd, "!friendly add me <@2>").await;
        run(&options, &cmd, "!friendly stats").await;

        let actions = chat.actions();
        assert_eq!(
            &actions[..3],
            &[
                Action::React(10, 3, SUCCESS_EMOJI.to_string()),
                Action::React(10, 3, SUCCESS_EMOJI.to_string()),
                Action::React(10, 3, SUCCESS_EMOJI.to_string()),
            ]
        );
        let Action::Embed(10, embed) = &actions[3] else {
            panic!("expected the stats embed");
        };
        assert_eq!(embed.fields[0].value, "1. alice - 2\n2. bob - 1");
        assert!(embed.fields[1].value.starts_with("alice killed bob on "));
        assert_eq!(embed.fields[2].value, "alice has killed bob 2 time(s)");
    }

    #[tokio::test]
    async fn test_stats_when_empty() {
        let (options, chat) = test_options();
        let cmd = Friendly {
            base: CommandBase::new(&options),
        };

        run(&options, &cmd, "!friendly stats").await;
        run(&options, &cmd, "!friendly").await;

        assert_eq!(
            chat.actions(),
            vec![
                Action::Send(10, "No friendly fire recorded yet. Lucky you!".to_string()),
                Action::Send(10, "Missing sub command, try: `add`, `stats`!".to_string()),
            ]
        );
    }
}
