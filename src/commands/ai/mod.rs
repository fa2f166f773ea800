//! Conversational assistant backed by the completion service.

pub mod crawl;

use super::{report_failure, Command, CommandBase, CommandPlugin};
use crate::chat::{split_for_discord, DISCORD_MESSAGE_LIMIT};
use crate::core::channels::ExecContext;
use crate::core::plugin::{InitOptions, Plugin};
use crate::core::serial::SerialQueue;
use crate::help::{build_help, HelpSpec};
use crate::llm::{CompletionRequest, CompletionService, OpenAiResponses};
use async_trait::async_trait;
use crawl::{crawl, extract_links, CrawlResult};
use serenity::model::channel::Message;
use serenity::model::user::User;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const CRAWL_TIMEOUT_SECS: u64 = 15;

/// Explains the prompt layout built by [`build_prompt`].
pub const PROMPT_INSTRUCTIONS: &str = "\n\n\
The prompt will begin with the header `Direct message from <authorId>:` if its a direct message or \
`Public chat message from <authorId>:` if its a message in a public Discord channel. `<authorId>` \
will be in the form of `<displayName>, ID <id>` where `<displayName>` is the user's nickname and `<id>` \
is the user's unique Discord id. Then the message content will follow.\n\n\
Optionally, if the message is a reply to another user's message, after the original message content \
there will be a text like `Message content end. The above message is a reply to this message from \
<replyAuthorId>:` where `<replyAuthorId>` follows the same format as `<authorId>` and is the author of \
the message which the above message is replying to. Then the content of the message being replied to \
will follow.\n\n\
If the messages contain links which resolve to HTML, they will be included as a JSON array at the \
bottom beginning with the text `Links in the messages:` with the following keys:\n\n\
* `url` - the original matched URL\n\
* `title` - the title of the page\n\
* `description` - the description meta tag\n\
* `paragraphs` - the content of the first 10 matched `<p>` tags trimmed to 1500 characters.\n\n\
If links are images (or there are images among attachments), they will be supplied via \"input_image\" \
entries to your input.\n\n\
The response should **never** exceed 1900 characters!";

pub struct Ai {
    base: CommandBase,
    responder: Arc<Responder>,
    queue: SerialQueue<String>,
}

/// State needed to answer a prompt, shared with queued rounds.
struct Responder {
    base: CommandBase,
    completion: Arc<dyn CompletionService>,
    http: reqwest::Client,
    model: String,
    instructions: String,
}

/// Loaded only when an API key is configured.
pub fn create(options: &InitOptions) -> Option<Arc<dyn Plugin>> {
    let config = &options.config;
    let Some(api_key) = config.openai_api_key.as_deref() else {
        info!("ai: no API key configured, not loading");
        return None;
    };

    let completion = match OpenAiResponses::new(config, api_key) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("ai: could not create completion client: {:#}", e);
            return None;
        }
    };

    let instructions = match &config.openai_instructions_path {
        Some(path) => std::fs::read_to_string(path).unwrap_or_else(|e| {
            warn!("ai: could not read instructions from {}: {}", path, e);
            String::new()
        }),
        None => String::new(),
    };

    CommandPlugin::boxed(Ai::new(options, completion, instructions))
}

/// Conversation the message belongs to: the whole guild, or the author's DMs.
pub fn conversation_id(msg: &Message) -> String {
    match msg.guild_id {
        Some(guild_id) => format!("g:{}", guild_id),
        None => format!("a:{}", msg.author.id),
    }
}

pub fn author_string(user: &User) -> String {
    format!("{}, ID {}", user.display_name(), user.id)
}

/// Prompt text for `body`, plus the links found in it and in any replied-to
/// message or attachments.
pub fn build_prompt(msg: &Message, body: &str) -> (String, Vec<String>) {
    let author = author_string(&msg.author);
    let mut text = if msg.guild_id.is_none() {
        format!("Direct message from {}:", author)
    } else {
        format!("Public chat message from {}:", author)
    };
    text.push_str("\n\n");
    text.push_str(body);

    let mut links = extract_links(&text);

    if let Some(replied) = &msg.referenced_message {
        text.push_str(&format!(
            "\n\nMessage content end. The above message is a reply to this message from {}:\n\n{}",
            author_string(&replied.author),
            replied.content
        ));
        links.extend(extract_links(&replied.content));
        links.extend(replied.attachments.iter().map(|a| a.url.clone()));
    }
    links.extend(msg.attachments.iter().map(|a| a.url.clone()));

    (text, links)
}

impl Ai {
    pub fn new(
        options: &InitOptions,
        completion: Arc<dyn CompletionService>,
        instructions: String,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(CRAWL_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        let base = CommandBase::new(options);
        Self {
            responder: Arc::new(Responder {
                base: base.clone(),
                completion,
                http,
                model: options.config.openai_model.clone(),
                instructions,
            }),
            base,
            queue: SerialQueue::new(),
        }
    }

    /// Answer `ctx` right away, outside the conversation queue.
    pub async fn respond(&self, ctx: ExecContext) -> anyhow::Result<()> {
        self.responder.respond(ctx).await
    }
}

impl Responder {
    /// One prompt/response round for `ctx`, continuing its conversation.
    async fn respond(&self, ctx: ExecContext) -> anyhow::Result<()> {
        let client = self.base.client();
        let msg = &ctx.msg;
        let conversation = conversation_id(msg);

        let previous = {
            let conversation = conversation.clone();
            ctx.store
                .run_blocking(move |db| db.get_previous_response_id(&conversation))
                .await?
        };

        let (mut text, links) = build_prompt(msg, &ctx.args.join(" "));
        let mut pages = Vec::new();
        let mut image_urls = Vec::new();
        for link in &links {
            match crawl(&self.http, link).await {
                Some(CrawlResult::Html(page)) => pages.push(page),
                Some(CrawlResult::Image(url)) => image_urls.push(url),
                None => {}
            }
        }
        if !pages.is_empty() {
            text.push_str("\n\nLinks in the messages:\n\n```json\n");
            text.push_str(&serde_json::to_string(&pages)?);
            text.push_str("```");
        }

        let nickname = match client.current_user_id() {
            Some(bot) => client.display_name(msg.guild_id, bot).await,
            None => "Unknown".to_string(),
        };
        let instructions = format!(
            "{}{}\n\nYour nickname is {}.",
            self.instructions, PROMPT_INSTRUCTIONS, nickname
        );

        debug!(
            "ai: {} asks in {} ({} links, continued: {})",
            msg.author.id,
            conversation,
            links.len(),
            previous.is_some()
        );
        let response = self
            .completion
            .respond(CompletionRequest {
                model: self.model.clone(),
                instructions,
                text,
                image_urls,
                previous_response_id: previous,
            })
            .await?;

        let response_id = response.id.clone();
        ctx.store
            .run_blocking(move |db| db.set_previous_response_id(&conversation, &response_id))
            .await?;

        let mut chunks = split_for_discord(&response.output_text, DISCORD_MESSAGE_LIMIT).into_iter();
        let Some(first) = chunks.next() else {
            warn!("ai: empty completion {}", response.id);
            return Ok(());
        };
        client.reply(msg.channel_id, msg.id, &first).await?;
        for chunk in chunks {
            client.send_message(msg.channel_id, &chunk).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Command for Ai {
    fn trigger(&self) -> &str {
        "ai"
    }

    fn base(&self) -> &CommandBase {
        &self.base
    }

    async fn exec(&self, ctx: ExecContext) -> anyhow::Result<()> {
        if ctx.args.is_empty() {
            return self.send_help(ctx.msg).await;
        }
        // Rounds of one conversation must see each other's response ids.
        let responder = self.responder.clone();
        self.queue.push(conversation_id(&ctx.msg), async move {
            let msg = ctx.msg.clone();
            if let Err(e) = responder.respond(ctx).await {
                report_failure(responder.base.client(), &msg, "ai", e).await;
            }
        });
        Ok(())
    }

    async fn send_help(&self, msg: Message) -> anyhow::Result<()> {
        let description = format!(
            "Utilizes ChatGPT for interactive replies.\n\nUsage - `{}{} <some prompt>`",
            self.base.prefix(),
            self.trigger()
        );
        let embed = build_help(
            HelpSpec {
                title: self.trigger(),
                description: &description,
                ..Default::default()
            },
            self.base.prefix(),
        );
        self.base.client().send_embed(msg.channel_id, embed).await
    }
}
