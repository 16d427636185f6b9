//! KitchenMaster - conversational kitchen design assistant
//!
//! Each user message runs one turn of a small workflow: the reasoning
//! service reads intent and design parameters, a router picks a branch
//! (clarify, generate, edit or converse), and the branch produces the
//! reply plus any artifacts. Conversation state is carried between turns
//! by the session layer.
//!
//! # Modules
//!
//! - [`workflow`] - Turn orchestration and branches
//! - [`domain`] - Design parameters, artifacts and conversation state
//! - [`reasoning`] - Intent extraction and free conversation
//! - [`image`] - Image generation and editing clients
//! - [`llm`] - LLM client trait and provider implementations
//! - [`session`] - Chat service and stored conversation archive
//! - [`state`] - Store actor
//! - [`prompts`] - Prompt templates
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod image;
pub mod llm;
pub mod prompts;
pub mod reasoning;
pub mod session;
pub mod state;
pub mod workflow;
