//! ABOUTME: Per-node-kind executors dispatched by the broadcaster
//! ABOUTME: router/tool/llm are plain functions; child lives on Engine since it recurses into orchestrate()

pub mod llm;
pub mod router;
pub mod tool;
