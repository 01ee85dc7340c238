//! 数据模型模块
//! 用户、角色、权限实体，及其创建草稿与规则集

pub mod permission;
pub mod principal;
pub mod role;
pub mod user;
