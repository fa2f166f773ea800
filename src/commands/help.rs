use super::{Command, CommandBase, CommandPlugin};
use crate::chat::react_fail;
use crate::core::channels::{command_help, ExecContext};
use crate::core::plugin::{InitOptions, Plugin};
use crate::core::registry::RegistryExt;
use crate::help::{build_help, HelpSpec};
use async_trait::async_trait;
use serenity::model::channel::Message;
use std::sync::Arc;

pub struct Help {
    base: CommandBase,
}

pub fn create(options: &InitOptions) -> Option<Arc<dyn Plugin>> {
    CommandPlugin::boxed(Help {
        base: CommandBase::new(options),
    })
}

impl Help {
    fn overview(&self) -> crate::chat::Embed {
        let prefix = self.base.prefix();
        let listing: String = self
            .base
            .get_commands()
            .iter()
            .map(|trigger| format!("\n▫️ `{prefix}{trigger}`"))
            .collect();

        build_help(
            HelpSpec {
                title: "Loot Lord help",
                description: &format!(
                    "To get help for a command, type:\n`{prefix}help <somecommand>`"
                ),
                additional: vec![("Commands with available help".to_string(), listing)],
                ..Default::default()
            },
            prefix,
        )
    }
}

#[async_trait]
impl Command for Help {
    fn trigger(&self) -> &str {
        "help"
    }

    fn base(&self) -> &CommandBase {
        &self.base
    }

    async fn exec(&self, ctx: ExecContext) -> anyhow::Result<()> {
        let Some(target) = ctx.args.first() else {
            return self.send_help(ctx.msg).await;
        };

        let key = command_help(&target.to_lowercase());
        match self.base.registry().dispatch(&key, ctx.msg.clone()) {
            Ok(()) => Ok(()),
            Err(_) => {
                react_fail(
                    self.base.client(),
                    ctx.msg.channel_id,
                    ctx.msg.id,
                    Some(&format!(
                        "The command \"{}\" could not be found or help for it is not available!",
                        target
                    )),
                )
                .await;
                Ok(())
            }
        }
    }

    async fn send_help(&self, msg: Message) -> anyhow::Result<()> {
        self.base
            .client()
            .send_embed(msg.channel_id, self.overview())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{EmbedField, FAIL_EMOJI};
    use crate::core::channels::command_exec;
    use crate::testing::{mock_message, mock_user, test_options, Action};
    use std::sync::Mutex;

    fn exec_ctx(options: &InitOptions, args: &[&str]) -> ExecContext {
        ExecContext {
            msg: mock_message(5, 10, mock_user(1, "a", false), "!help"),
            store: options.store.clone(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_overview_lists_commands_with_help() {
        let (options, chat) = test_options();
        for trigger in ["foo", "bar", "baz"] {
            options.registry.register(&command_exec(trigger)).unwrap();
            options.registry.register(&command_help(trigger)).unwrap();
        }
        let help = Help {
            base: CommandBase::new(&options),
        };

        help.exec(exec_ctx(&options, &[])).await.unwrap();

        let actions = chat.actions();
        let Action::Embed(10, embed) = &actions[0] else {
            panic!("expected an embed");
        };
        assert_eq!(embed.title.as_deref(), Some("Loot Lord help"));
        assert_eq!(
            embed.description.as_deref(),
            Some("To get help for a command, type:\n`!help <somecommand>`")
        );
        assert_eq!(
            embed.fields,
            vec![EmbedField {
                name: "Commands with available help".to_string(),
                value: "\n▫️ `!foo`\n▫️ `!bar`\n▫️ `!baz`".to_string(),
                inline: false,
            }]
        );
    }

    #[tokio::test]
    async fn test_unknown_command_reacts_fail() {
        let (options, chat) = test_options();
        let help = Help {
            base: CommandBase::new(&options),
        };

        help.exec(exec_ctx(&options, &["foobar"])).await.unwrap();

        assert_eq!(
            chat.actions(),
            vec![
                Action::React(10, 5, FAIL_EMOJI.to_string()),
                Action::Send(
                    10,
                    "The command \"foobar\" could not be found or help for it is not available!"
                        .to_string()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_forwards_source_message_to_help_channel() {
        let (options, chat) = test_options();
        let subject = options.registry.register(&command_help("foobar")).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        subject.subscribe(move |msg: Message| sink.lock().unwrap().push(msg.id));

        let help = Help {
            base: CommandBase::new(&options),
        };
        help.exec(exec_ctx(&options, &["foobar"])).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![serenity::model::id::MessageId::new(5)]);
        assert!(chat.actions().is_empty());
    }
}
