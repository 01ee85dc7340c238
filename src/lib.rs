//! ACL 服务库
//! 用户、角色、权限的存储与检查，以及会话身份解析

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod services;
pub mod session;
pub mod telemetry;
pub mod validation;
