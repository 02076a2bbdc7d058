#![cfg(test)]
#![allow(clippy::panic_in_result_fn)]

mod common;
mod composition;
mod pipeline;
