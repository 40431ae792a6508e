//! Wiktionary markup engine.
//!
//! Expands the macros of a raw dictionary page and segments it into a
//! normalized [`Word`]: pronunciations, genders, etymology, definitions by
//! part of speech, and variant cross-references. Each source-language
//! edition supplies its vocabulary as YAML plus a small set of hooks; the
//! engine itself is shared.
//!
//! ```no_run
//! use wikidict::{parse_word, Edition, Services};
//!
//! let edition = Edition::load("fr")?;
//! let word = parse_word("chats", "== {{langue|fr}} ==\n…", &edition, &Services::default());
//! println!("{}", serde_json::to_string(&word).unwrap());
//! # Ok::<(), wikidict::ConfigError>(())
//! ```

pub mod call;
pub mod defaults;
pub mod definitions;
pub mod dump;
pub mod edition;
pub mod error;
pub mod formula;
pub mod functions;
pub mod markup;
pub mod place;
pub mod render;
pub mod resolver;
pub mod segment;
pub mod services;
pub mod variants;
pub mod wikitext;
pub mod word;

pub use call::{sentinel, MacroCall};
pub use edition::{Edition, EditionHooks, Fallback, FallbackContext};
pub use error::ConfigError;
pub use render::parse_word;
pub use resolver::Resolver;
pub use services::{RemoteRenderer, Services, Transliterator};
pub use word::{Definition, Definitions, Groups, SubDefinition, Word, Words};
