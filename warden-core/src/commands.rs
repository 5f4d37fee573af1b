// ABOUTME: Ordered, case-insensitive command classification and the built-in command handlers
// ABOUTME: Operating-system commands run from fixed argv lists, never through a shell

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::CommandsConfig;
use crate::traits::{MessageContent, RoomTransport};
use crate::utils::code_block;

/// A command line with the prefix already removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    /// The line as typed
    pub line: String,
    /// Lowercased line, used only for matching
    pub lower: String,
    /// Whitespace-split words after the command word
    pub args: Vec<String>,
}

impl CommandInvocation {
    pub fn parse(line: &str) -> Self {
        Self {
            line: line.to_string(),
            lower: line.to_lowercase(),
            args: line.split_whitespace().skip(1).map(String::from).collect(),
        }
    }

    /// Get the first argument if present
    pub fn first_arg(&self) -> Option<&str> {
        self.args.first().map(|s| s.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Echo,
    React,
    Help,
    List,
    Date,
    WhoAmI,
    Unknown,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Echo => "echo",
            CommandKind::React => "react",
            CommandKind::Help => "help",
            CommandKind::List => "list",
            CommandKind::Date => "date",
            CommandKind::WhoAmI => "whoami",
            CommandKind::Unknown => "unknown",
        }
    }
}

/// Rules in priority order; the first pattern matching the lowercased line wins
const RULES: &[(CommandKind, &str)] = &[
    (CommandKind::Echo, r"^echo$|^echo .*"),
    (CommandKind::React, r"^react$|^react .*"),
    (
        CommandKind::Help,
        r"^help$|^ayuda$|^man$|^manual$|^hilfe$|^je suis perdu$|^perdu$|^socorro$|^h$|^rescate$|^rescate .*|^help .*|^help.sh$",
    ),
    (CommandKind::List, r"^list$|^ls$|^dir$|^directory$"),
    (
        CommandKind::Date,
        r"^date$|^datum$|^data$|^fecha$|^time$|^hora$|^heure$|^uhrzeit$",
    ),
    (CommandKind::WhoAmI, r"^w$|^who$|^whoami$"),
];

/// Aliases whose following words name a help topic
const HELP_TOPIC_PATTERN: &str = r"^(help|rescate) ";

const ECHO_PLACEHOLDER: &str = "echo!";
const HELP_GREETING: &str =
    "Hello, I am your bot! Use `help all` or `help commands` to view available commands.";
const HELP_RULES: &str = "These are the rules: Act responsibly.";
const REACTIONS: &[&str] = &["⭐", "Some text"];

/// The event that triggered a command
#[derive(Debug, Clone, Copy)]
pub struct CommandContext<'a> {
    pub room_id: &'a str,
    pub event_id: &'a str,
    pub sender: &'a str,
}

/// Output of an operating-system command, formatted for a chat reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsCommandOutput {
    pub text: String,
    pub failed: bool,
}

pub struct CommandRouter {
    rules: Vec<(CommandKind, Regex)>,
    help_topic: Regex,
    commands: CommandsConfig,
}

impl CommandRouter {
    pub fn new(commands: CommandsConfig) -> Result<Self> {
        let rules = RULES
            .iter()
            .map(|(kind, pattern)| {
                Regex::new(pattern)
                    .map(|re| (*kind, re))
                    .with_context(|| format!("Invalid pattern for {} command", kind.as_str()))
            })
            .collect::<Result<Vec<_>>>()?;
        let help_topic = Regex::new(HELP_TOPIC_PATTERN).context("Invalid help topic pattern")?;

        Ok(Self {
            rules,
            help_topic,
            commands,
        })
    }

    /// Pick the handler for a command line
    pub fn classify(&self, invocation: &CommandInvocation) -> CommandKind {
        self.rules
            .iter()
            .find(|(_, re)| re.is_match(&invocation.lower))
            .map(|(kind, _)| *kind)
            .unwrap_or(CommandKind::Unknown)
    }

    /// Classify `line` and run its handler; returns which handler ran
    pub async fn route(
        &self,
        line: &str,
        ctx: &CommandContext<'_>,
        transport: &dyn RoomTransport,
    ) -> Result<CommandKind> {
        let invocation = CommandInvocation::parse(line);
        let kind = self.classify(&invocation);

        tracing::debug!(
            room_id = ctx.room_id,
            sender = ctx.sender,
            command = kind.as_str(),
            "Routing command"
        );
        crate::metrics::record_command(kind.as_str());

        match kind {
            CommandKind::Echo => {
                let reply = echo_reply(&invocation);
                transport
                    .send_room_message(ctx.room_id, MessageContent::markdown(reply))
                    .await?;
            }
            CommandKind::React => {
                for key in REACTIONS {
                    transport.react(ctx.room_id, ctx.event_id, key).await?;
                }
            }
            CommandKind::Help => self.show_help(&invocation, ctx, transport).await?,
            CommandKind::List => {
                let output = run_os_command(&self.commands.list).await;
                transport
                    .send_room_message(ctx.room_id, MessageContent::markdown(code_block(&output.text)))
                    .await?;
            }
            CommandKind::Date => {
                let output = run_os_command(&self.commands.date).await;
                transport
                    .send_room_message(ctx.room_id, MessageContent::markdown(code_block(&output.text)))
                    .await?;
            }
            CommandKind::WhoAmI => {
                transport
                    .send_room_message(ctx.room_id, MessageContent::markdown(whoami_reply()))
                    .await?;
            }
            CommandKind::Unknown => {
                transport
                    .send_room_message(
                        ctx.room_id,
                        MessageContent::markdown(unknown_command_reply(&invocation.line)),
                    )
                    .await?;
            }
        }

        Ok(kind)
    }

    /// Topic for the help command, only for aliases that take one.
    ///
    /// Only `help` and `rescate` read a topic. The multi-word aliases such as
    /// `je suis perdu` always get the greeting, so their trailing words are
    /// never mistaken for a topic.
    fn help_topic<'a>(&self, invocation: &'a CommandInvocation) -> Option<&'a str> {
        if self.help_topic.is_match(&invocation.lower) {
            invocation.first_arg()
        } else {
            None
        }
    }

    async fn show_help(
        &self,
        invocation: &CommandInvocation,
        ctx: &CommandContext<'_>,
        transport: &dyn RoomTransport,
    ) -> Result<()> {
        let reply = match self.help_topic(invocation) {
            None => HELP_GREETING.to_string(),
            Some(topic) => match topic.to_lowercase().as_str() {
                "rules" => HELP_RULES.to_string(),
                "commands" | "all" => {
                    let output = run_os_command(&self.commands.help).await;
                    if output.failed {
                        code_block(&output.text)
                    } else {
                        output.text
                    }
                }
                _ => format!("Unknown help topic `{}`!", topic),
            },
        };

        transport
            .send_room_message(ctx.room_id, MessageContent::markdown(reply))
            .await
    }
}

fn echo_reply(invocation: &CommandInvocation) -> String {
    let response = invocation.args.join(" ");
    if response.trim().is_empty() {
        ECHO_PLACEHOLDER.to_string()
    } else {
        response
    }
}

fn unknown_command_reply(line: &str) -> String {
    format!(
        "Unknown command `{}`. Try the `help` command for more information.",
        line
    )
}

fn env_or_unknown(names: &[&str]) -> String {
    names
        .iter()
        .find_map(|name| std::env::var(name).ok())
        .unwrap_or_else(|| "unknown".to_string())
}

fn whoami_reply() -> String {
    format!(
        "- user name: `{}`\n- home: `{}`\n- path: `{}`",
        env_or_unknown(&["LOGNAME", "USER", "LNAME", "USERNAME"]),
        env_or_unknown(&["HOME", "USERPROFILE"]),
        env_or_unknown(&["PATH"]),
    )
}

/// Run a fixed argv list and turn its result into reply text.
/// Failures become the reply instead of an error.
pub async fn run_os_command(argv: &[String]) -> OsCommandOutput {
    let command_line = argv.join(" ");
    let Some((program, args)) = argv.split_first() else {
        return OsCommandOutput {
            text: "Bot encountered an error: no command configured".to_string(),
            failed: true,
        };
    };

    tracing::debug!(program = %program, args = ?args, "Running OS command");

    let output = match tokio::process::Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
    {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!(command = %command_line, error = %e, "Failed to run OS command");
            return OsCommandOutput {
                text: format!("Bot encountered an error: {}", e),
                failed: true,
            };
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if output.status.success() {
        return OsCommandOutput {
            text: stdout,
            failed: false,
        };
    }

    let code = output
        .status
        .code()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "none (terminated by signal)".to_string());
    tracing::debug!(
        command = %command_line,
        code = %code,
        stderr = %stderr,
        "OS command exited unsuccessfully"
    );

    OsCommandOutput {
        text: format!(
            "*** Error: command `{}` returned error code {}. ***\n{}\n{}",
            command_line, code, stderr, stdout
        ),
        failed: true,
    }
}
