//! Platform glue. Only the browser is wired up; native builds drive
//! [`Game::step`](crate::flow::Game::step) themselves.

#[cfg(target_arch = "wasm32")]
pub mod web;
