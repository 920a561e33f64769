//! 外部协作者端口：用户档案与团队目录
//!
//! 用户与团队的增删改查在本系统之外完成，这里只定义读取端口，
//! 用于展示增强和团队房间的成员校验。

use async_trait::async_trait;
use domain::{RepositoryError, TeamId, UserId, UserProfile};

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_profile(
        &self,
        user_id: UserId,
    ) -> Result<Option<UserProfile>, RepositoryError>;
}

#[async_trait]
pub trait TeamDirectory: Send + Sync {
    async fn is_member(
        &self,
        team_id: TeamId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError>;
}
