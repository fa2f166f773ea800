use crate::chat::Embed;

pub const HELP_COLOR: u32 = 8604151;

/// Content of a command help embed.
#[derive(Debug, Clone, Default)]
pub struct HelpSpec<'a> {
    pub title: &'a str,
    pub description: &'a str,
    /// `(command without prefix, explanation)`
    pub commands: Vec<(String, String)>,
    /// `(title, value)` fields placed after the commands.
    pub additional: Vec<(String, String)>,
}

pub fn build_help(spec: HelpSpec<'_>, prefix: &str) -> Embed {
    let commands = spec
        .commands
        .into_iter()
        .map(|(command, explanation)| (format!("{prefix}{command}"), explanation));

    commands
        .chain(spec.additional)
        .fold(
            Embed::new()
                .title(spec.title)
                .description(spec.description)
                .color(HELP_COLOR),
            |embed, (name, value)| embed.field(name, value, false),
        )
}
