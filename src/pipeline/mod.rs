//! Pipeline stages for PDF-to-illustration requests.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the provider can be swapped without touching the rest.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ (prompts) ──▶ generate ──▶ persist
//! (upload)  (text)      (policy)      (provider)   (PNG file)
//! ```
//!
//! 1. [`input`]    — check the `%PDF` magic and store the upload under a
//!    random name
//! 2. [`extract`]  — concatenate page text and truncate; runs in
//!    `spawn_blocking` because the parser is synchronous
//! 3. [`generate`] — drive the provider call with timeout and retry; the
//!    only stage with network I/O
//! 4. [`encode`]   — PNG and base64 helpers shared by providers and persist
//! 5. [`persist`]  — write the PNG exclusively and derive its public URL

pub mod encode;
pub mod extract;
pub mod generate;
pub mod input;
pub mod persist;
