//! Free-text ("prefix") commands.
//!
//! A message such as `!mod ban "some user" spamming links` is handled in three
//! steps:
//!
//! 1. [`PrefixMatcher`] strips the prefix (or a mention of the bot) and
//!    returns a [`StringView`] positioned after it.
//! 2. [`CommandTree::invoke`] reads one word per tree level to find the
//!    target command (`mod` → `ban`).
//! 3. The target's parameters are read from the remaining text and converted
//!    through the [`ConverterRegistry`](crate::converter::ConverterRegistry)
//!    before its handler runs.
//!
//! ```rust,ignore
//! let mut tree = CommandTree::new();
//! let moderation = tree.add(Command::new("mod").alias("m"))?;
//! tree.add_under(
//!     moderation,
//!     Command::new("ban")
//!         .param(Parameter::required("target", ArgumentType::Member))
//!         .param(Parameter::optional("reason", ArgumentType::Fill))
//!         .handler(|ctx: CommandContext| async move {
//!             let target = ctx.args().get("target")?.as_member()?;
//!             Ok(())
//!         }),
//! )?;
//! ```

mod prefix;
mod tree;
mod view;

pub use prefix::PrefixMatcher;
pub use tree::{Command, CommandNode, CommandTree};
pub use view::{QUOTES, StringView, closing_quote, is_quote};
