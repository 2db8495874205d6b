//! One module per CLI subcommand.
//!
//! | Command                                   | Module         |
//! |--------------------------------------------|----------------|
//! | `adw execute <plan> [--resume] [--branch]`  | [`execute`]    |
//! | `adw chunk <plan> [--output]`                | [`chunk`]      |
//! | `adw status [path]`                          | [`status`]     |
//! | `adw retry <chunk-id> [path]`                 | [`retry`]      |
//! | `adw validate <plan>`                        | [`validate`]   |
//! | `adw config`                                  | [`config`]     |

pub mod chunk;
pub mod config;
pub mod execute;
pub mod retry;
pub mod status;
pub mod validate;
