//! Structured ("slash") commands.
//!
//! Unlike text commands, structured invocations arrive pre-parsed: the
//! platform sends the chosen subcommand path as nested options and every
//! argument as an already-typed value. [`InteractionTree`] therefore never
//! tokenizes. It walks the explicit path, flattens the option tree into a
//! name → value map and resolves parameters by name.
//!
//! The tree also knows how to describe itself to the platform:
//! [`InteractionTree::export_schema`] produces the bulk-registration payload.
//!
//! ```rust,ignore
//! let mut tree = InteractionTree::new();
//! let tag = tree.add(InteractionCommand::new("tag").describe("Manage tags"))?;
//! tree.add_under(
//!     tag,
//!     InteractionCommand::new("show")
//!         .describe("Show a tag")
//!         .param(Parameter::required("name", ArgumentType::String))
//!         .handler(|ctx: InteractionContext| async move { Ok(()) }),
//! )?;
//! let schema = tree.export_schema();
//! ```

mod options;
mod schema;
mod tree;

pub use options::{command_path, flatten_options};
pub use schema::option_type;
pub use tree::{Classification, InteractionCommand, InteractionNode, InteractionTree};
