//! Voice-driven localisation and accessibility compliance agent.
//!
//! A run translates content (simulated), sends page markup to a Gemini
//! analysis gateway that reports WCAG and localisation issues, and hands the
//! issues to an external kanban board (simulated).  Progress is narrated
//! through the host's speech synthesiser and a run can be started by voice.
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | Phase state machine and orchestrator |
//! | [`gateway`] | Gemini compliance analysis |
//! | [`narration`] | Fire-and-forget spoken status |
//! | [`voice`] | Trigger-phrase listener |
//! | [`translate`] | DeepL batch translation of locale files |
//! | [`issue`] | Issue model |
//! | [`config`] | `settings.toml` and platform paths |

pub mod capability;
pub mod config;
pub mod gateway;
pub mod issue;
pub mod narration;
pub mod pipeline;
pub mod translate;
pub mod voice;
