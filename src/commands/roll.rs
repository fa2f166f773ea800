use super::{parse_int, Command, CommandBase, CommandPlugin};
use crate::chat::react_fail;
use crate::core::channels::ExecContext;
use crate::core::plugin::{InitOptions, Plugin};
use crate::help::{build_help, HelpSpec};
use async_trait::async_trait;
use serenity::model::channel::Message;
use std::sync::Arc;

pub struct Roll {
    base: CommandBase,
}

pub fn create(options: &InitOptions) -> Option<Arc<dyn Plugin>> {
    CommandPlugin::boxed(Roll {
        base: CommandBase::new(options),
    })
}

/// What a set of `roll` arguments asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollPlan {
    Help,
    /// Upper bound exclusive.
    Range(i64, i64),
    Choice(Vec<String>),
    NotANumber,
}

/// A random integer in `[from, to)`; swapped bounds are put in order.
///
/// `rng` is a uniform sample from `[0, 1)`.
pub fn int_range(from: i64, to: i64, rng: f64) -> i64 {
    let (from, to) = if from > to { (to, from) } else { (from, to) };
    // Widened so the full i64 span cannot overflow.
    let span = (i128::from(to) - i128::from(from)) as f64;
    let value = (rng * span).floor() as i128 + i128::from(from);
    let last = (i128::from(to) - 1).max(i128::from(from));
    value.clamp(i128::from(from), last) as i64
}

pub fn plan(args: &[String]) -> RollPlan {
    match args {
        [] => RollPlan::Range(0, 101),
        [only] if only == "help" => RollPlan::Help,
        [only] => {
            if let Some(n) = parse_int(only) {
                return RollPlan::Range(0, n.saturating_add(1));
            }
            let dice = only
                .strip_prefix(['d', 'D'])
                .and_then(parse_int);
            match dice {
                Some(sides) => RollPlan::Range(1, sides.saturating_add(1)),
                None => RollPlan::NotANumber,
            }
        }
        [first, second] => match (parse_int(first), parse_int(second)) {
            (Some(from), Some(to)) => RollPlan::Range(from, to),
            _ => RollPlan::Choice(args.to_vec()),
        },
        _ => RollPlan::Choice(args.to_vec()),
    }
}

fn format_roll(value: &str) -> String {
    format!("🎲 **{}** 🎲", value)
}

#[async_trait]
impl Command for Roll {
    fn trigger(&self) -> &str {
        "roll"
    }

    fn base(&self) -> &CommandBase {
        &self.base
    }

    async fn exec(&self, ctx: ExecContext) -> anyhow::Result<()> {
        let client = self.base.client();
        let result = match plan(&ctx.args) {
            RollPlan::Help => return self.send_help(ctx.msg).await,
            RollPlan::NotANumber => {
                react_fail(
                    client,
                    ctx.msg.channel_id,
                    ctx.msg.id,
                    Some("if you are providing just 1 argument, it has to be a number!"),
                )
                .await;
                return Ok(());
            }
            RollPlan::Range(from, to) => int_range(from, to, rand::random()).to_string(),
            RollPlan::Choice(options) => {
                let index = int_range(0, options.len() as i64, rand::random()) as usize;
                options[index.min(options.len() - 1)].clone()
            }
        };

        client
            .send_message(ctx.msg.channel_id, &format_roll(&result))
            .await
    }

    async fn send_help(&self, msg: Message) -> anyhow::Result<()> {
        let t = self.trigger();
        let embed = build_help(
            HelpSpec {
                title: t,
                description: "Virtual dice.",
                commands: vec![
                    (t.to_string(), "Get a number between 0 and 100.".to_string()),
                    (
                        format!("{t} <to>"),
                        "Get a number from 0 to the provided number.".to_string(),
                    ),
                    (
                        format!("{t} d<to>"),
                        format!(
                            "Get a number from 1 to the provided number, e.g. `{}{t} d20` to get a number between 1 and 20.",
                            self.base.prefix()
                        ),
                    ),
                    (
                        format!("{t} <from> <to>"),
                        "Get a number in a provided range. Upper bound exclusive.".to_string(),
                    ),
                    (
                        format!("{t} <option> <option> <option> ..."),
                        "Pick one of given options.".to_string(),
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
    use crate::chat::FAIL_EMOJI;
    use crate::testing::{mock_message, mock_user, test_options, Action};

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_int_range() {
        let cases = [
            (69, 0, 100, 0.69),
            (42, 100, 0, 0.42),
            (1, 1, 5, 0.0),
            (99, 1, 100, 0.99),
            (-10, -10, 10, 0.0),
            (9, -10, 10, 0.99),
            (-6, -10, -5, 0.99),
            (-6, -5, -10, 0.99),
        ];
        for (expected, from, to, rng) in cases {
            assert_eq!(int_range(from, to, rng), expected, "{} to {}", from, to);
        }
    }

    #[test]
    fn test_int_range_spans_all_of_i64() {
        let (min, max) = (-i64::MAX, i64::MAX);
        assert_eq!(
            plan(&["-9223372036854775807".to_string(), "9223372036854775807".to_string()]),
            RollPlan::Range(min, max)
        );
        assert_eq!(int_range(min, max, 0.0), min);
        assert!(int_range(min, max, 0.999_999).abs() > 1_000_000);
        assert!(int_range(min, max, 0.999_999_999_999) < max);
        assert_eq!(int_range(i64::MIN, i64::MAX, 0.5), 0);
    }

    #[test]
    fn test_plan() {
        assert_eq!(plan(&[]), RollPlan::Range(0, 101));
        assert_eq!(plan(&args(&["help"])), RollPlan::Help);
        assert_eq!(plan(&args(&["64"])), RollPlan::Range(0, 65));
        assert_eq!(plan(&args(&["d20"])), RollPlan::Range(1, 21));
        assert_eq!(plan(&args(&["5", "94"])), RollPlan::Range(5, 94));
        assert_eq!(plan(&args(&["foobar"])), RollPlan::NotANumber);
        assert_eq!(
            plan(&args(&["steve", "john"])),
            RollPlan::Choice(args(&["steve", "john"]))
        );
    }

    #[tokio::test]
    async fn test_single_non_numeric_argument_fails() {
        let (options, chat) = test_options();
        let roll = Roll {
            base: CommandBase::new(&options),
        };

        roll.exec(ExecContext {
            msg: mock_message(2, 10, mock_user(1, "a", false), "!roll foobar"),
            store: options.store.clone(),
            args: args(&["foobar"]),
        })
        .await
        .unwrap();

        assert_eq!(
            chat.actions(),
            vec![
                Action::React(10, 2, FAIL_EMOJI.to_string()),
                Action::Send(
                    10,
                    "if you are providing just 1 argument, it has to be a number!".to_string()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_dice_roll_stays_in_range() {
        let (options, chat) = test_options();
        let roll = Roll {
            base: CommandBase::new(&options),
        };

        for i in 0..50 {
            roll.exec(ExecContext {
                msg: mock_message(i + 1, 10, mock_user(1, "a", false), "!roll d20"),
                store: options.store.clone(),
                args: args(&["d20"]),
            })
            .await
            .unwrap();
        }

        for action in chat.actions() {
            let Action::Send(10, text) = action else {
                panic!("unexpected action");
            };
            let value: i64 = text
                .trim_start_matches("🎲 **")
                .trim_end_matches("** 🎲")
                .parse()
                .unwrap();
            assert!((1..=20).contains(&value), "rolled {}", value);
        }
    }

    #[tokio::test]
    async fn test_choice_picks_an_option() {
        let (options, chat) = test_options();
        let roll = Roll {
            base: CommandBase::new(&options),
        };
        let choices = args(&["steve", "john", "peter"]);

        roll.exec(ExecContext {
            msg: mock_message(1, 10, mock_user(1, "a", false), "!roll steve john peter"),
            store: options.store.clone(),
            args: choices.clone(),
        })
        .await
        .unwrap();

        let actions = chat.actions();
        let Action::Send(_, text) = &actions[0] else {
            panic!("expected a message");
        };
        assert!(choices.iter().any(|c| *text == format_roll(c)));
    }
}
