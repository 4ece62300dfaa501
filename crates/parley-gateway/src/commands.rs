//! Slash commands recognised in chats.
//!
//! A message is a command iff its first whitespace-delimited token exactly
//! matches a catalog entry. Image generation commands only exist while image
//! generation is enabled.

use rand::Rng;
use serde::Serialize;

/// Seeds drawn when none is given stay below this bound.
const RANDOM_SEED_BOUND: u64 = 1_000_000;

/// A recognised command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Forget the chat history.
    Reset,
    /// Generate an image; `raw` skips the LLM prompt rewrite.
    Diffuse { raw: bool },
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandOption {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub example: &'static str,
    pub required: bool,
}

/// Catalog entry, also shown to the LLM as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct CommandInfo {
    pub command: &'static str,
    pub description: &'static str,
    pub usage: &'static str,
    pub examples: &'static [&'static str],
    pub options: &'static [CommandOption],
}

const RESET: CommandInfo = CommandInfo {
    command: "/reset",
    description: "Wipes the assistant's memory of this chat and starts over. The assistant \
                  remembers nothing of the current conversation afterwards.",
    usage: "/reset",
    examples: &["/reset"],
    options: &[],
};

const DIFFUSE: CommandInfo = CommandInfo {
    command: "/diffuse",
    description: "Generates an image from a prompt after an AI rewrite of the text.",
    usage: "/diffuse <prompt>",
    examples: &["/diffuse A cat landing on Mars"],
    options: &[],
};

const SEED_OPTION: CommandOption = CommandOption {
    name: "-s",
    description: "Seed for the image generation. The same prompt and seed always produce \
                  the same image.",
    kind: "number",
    example: "/diffuseraw -s=123456 A cat landing on Mars",
    required: false,
};

const DIFFUSE_RAW: CommandInfo = CommandInfo {
    command: "/diffuseraw",
    description: "Generates an image from a prompt sent verbatim to the image model.",
    usage: "/diffuseraw [-s=123456] <prompt>",
    examples: &[
        "/diffuseraw A cat landing on Mars",
        "/diffuseraw -s=123456 A cat landing on Mars",
    ],
    options: &[SEED_OPTION],
};

/// Recognises commands against the catalog for the active capabilities.
#[derive(Debug, Clone, Copy)]
pub struct CommandDispatcher {
    image_generation: bool,
}

impl CommandDispatcher {
    pub fn new(image_generation: bool) -> Self {
        Self { image_generation }
    }

    /// Commands currently available.
    pub fn catalog(&self) -> Vec<&'static CommandInfo> {
        let mut commands = vec![&RESET];
        if self.image_generation {
            commands.push(&DIFFUSE);
            commands.push(&DIFFUSE_RAW);
        }
        commands
    }

    /// The command `text` invokes, if any.
    pub fn parse(&self, text: &str) -> Option<Command> {
        let first = text.split_whitespace().next()?;
        match first {
            "/reset" => Some(Command::Reset),
            "/diffuse" if self.image_generation => Some(Command::Diffuse { raw: false }),
            "/diffuseraw" if self.image_generation => Some(Command::Diffuse { raw: true }),
            _ => None,
        }
    }

    /// System context telling the model what commands exist.
    pub fn explanation(&self) -> String {
        let catalog = serde_json::to_string(&self.catalog()).unwrap_or_default();
        format!(
            "The user can execute commands as messages in this chat. Every message starting \
             with / is a user command, but you cannot execute or process commands as the \
             assistant: if the user explicitly asks for a command, tell them to run it directly. \
             Command invocations and their results are handled by the system and appended to \
             the chat history only to give you better context about the conversation. \
             ONLY mention commands when the user explicitly asks for them. If they ask, the ONLY \
             available commands are: {catalog}"
        )
    }
}

/// Arguments of a `/diffuse` or `/diffuseraw` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffusionArgs {
    pub prompt: String,
    pub raw: bool,
    pub seed: u64,
}

/// Parse `/diffuse[raw] [-s=<digits>] <prompt>`. A missing or unusable seed
/// is replaced by a random one.
pub fn parse_diffusion_args(text: &str) -> DiffusionArgs {
    let mut tokens = text.split_whitespace();
    let raw = tokens.next() == Some("/diffuseraw");

    let mut seed = None;
    let mut words = Vec::new();
    for token in tokens {
        match token.strip_prefix("-s=") {
            Some(value) => {
                if seed.is_none() {
                    seed = parse_seed(value);
                }
            }
            None => words.push(token),
        }
    }

    DiffusionArgs {
        prompt: words.join(" "),
        raw,
        seed: seed.unwrap_or_else(|| rand::thread_rng().gen_range(0..RANDOM_SEED_BOUND)),
    }
}

/// Keep the digits of `value`; zero and overflow count as unusable.
fn parse_seed(value: &str) -> Option<u64> {
    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    digits.parse::<u64>().ok().filter(|s| *s != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_always_available() {
        let d = CommandDispatcher::new(false);
        assert_eq!(d.parse("/reset"), Some(Command::Reset));
        assert_eq!(d.parse("/reset now please"), Some(Command::Reset));
        assert_eq!(d.parse("/diffuse a cat"), None);
        assert_eq!(d.catalog().len(), 1);
    }

    #[test]
    fn test_diffusion_commands_need_capability() {
        let d = CommandDispatcher::new(true);
        assert_eq!(d.parse("/diffuse a cat"), Some(Command::Diffuse { raw: false }));
        assert_eq!(d.parse("/diffuseraw a cat"), Some(Command::Diffuse { raw: true }));
        assert_eq!(d.catalog().len(), 3);
    }

    #[test]
    fn test_first_token_must_match_exactly() {
        let d = CommandDispatcher::new(true);
        assert_eq!(d.parse("/resetting"), None);
        assert_eq!(d.parse("please /reset"), None);
        assert_eq!(d.parse("/RESET"), None);
        assert_eq!(d.parse(""), None);
        assert_eq!(d.parse("   "), None);
    }

    #[test]
    fn test_explanation_lists_catalog_as_json() {
        let text = CommandDispatcher::new(true).explanation();
        assert!(text.contains("\"command\":\"/reset\""));
        assert!(text.contains("\"command\":\"/diffuseraw\""));
        assert!(text.contains("\"type\":\"number\""));

        let text = CommandDispatcher::new(false).explanation();
        assert!(!text.contains("/diffuse"));
    }

    #[test]
    fn test_diffusion_args_with_seed() {
        let args = parse_diffusion_args("/diffuseraw -s=42 a red fox");
        assert_eq!(
            args,
            DiffusionArgs {
                prompt: "a red fox".into(),
                raw: true,
                seed: 42,
            }
        );
    }

    #[test]
    fn test_diffusion_args_seed_anywhere_and_digits_only() {
        let args = parse_diffusion_args("/diffuse a red -s=12x3 fox");
        assert!(!args.raw);
        assert_eq!(args.prompt, "a red fox");
        assert_eq!(args.seed, 123);
    }

    #[test]
    fn test_diffusion_args_random_seed_when_invalid() {
        for text in ["/diffuse a cat", "/diffuse -s=abc a cat", "/diffuse -s=0 a cat"] {
            let args = parse_diffusion_args(text);
            assert_eq!(args.prompt, "a cat");
            assert!(args.seed < RANDOM_SEED_BOUND);
        }
    }
}
