//! 用户展示信息
//!
//! 用户的注册与资料管理由外部系统负责，这里只保留用于展示增强的最小档案。

use serde::{Deserialize, Serialize};

use crate::value_objects::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub display_name: Option<String>,
}
