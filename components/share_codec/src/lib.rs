//! Share tokens for Perflab experiments.
//!
//! A share token carries everything needed to reproduce an experiment
//! elsewhere: the baseline, the tests, the title and the identity. It is
//! the only persisted form used for sharing and deep links.
//!
//! # Format
//!
//! ```text
//! "#" + b64(baseline) + "/" + b64(tests_json) + "/" + b64(title) + "/" + b64(id)
//! ```
//!
//! `b64` is URL-safe base64 without padding, whose alphabet never contains
//! the `/` delimiter. The title and id parts may be omitted when decoding.
//!
//! # Examples
//!
//! ```
//! use core_types::Test;
//! use share_codec::{decode, encode};
//!
//! let tests = vec![Test::new("Spread", "[...data]")];
//! let token = encode("const data = [1, 2, 3]", &tests, "Copying", "abc").unwrap();
//! assert!(token.starts_with('#'));
//!
//! let state = decode(&token).unwrap();
//! assert_eq!(state.tests, tests);
//! assert_eq!(state.title, "Copying");
//! assert_eq!(state.id, "abc");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod codec;
mod error;

pub use codec::{decode, encode, SharedState, DELIMITER};
pub use error::{CodecError, CodecResult};
