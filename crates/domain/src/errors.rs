//! 领域模型错误定义
//!
//! 定义了私聊核心所有可能的错误类型，提供清晰的错误上下文。

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// 输入校验错误
    #[error("validation failed: {field}: {message}")]
    Validation { field: String, message: String },

    /// 不能向自己发送连接请求
    #[error("cannot send a connection request to yourself")]
    SelfRequest,

    /// 双方已经建立连接
    #[error("users are already connected")]
    AlreadyConnected,

    /// 已存在待处理的请求（无论方向）
    #[error("a connection request is already pending")]
    RequestPending,

    /// 操作者不是该资源的合法参与方
    #[error("unauthorized: {action}")]
    Unauthorized { action: String },

    /// 资源不存在
    #[error("not found: {resource}")]
    NotFound { resource: String },

    /// 当前状态下不允许该转换
    #[error("invalid state: {detail}")]
    InvalidState { detail: String },
}

impl DomainError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn unauthorized(action: impl Into<String>) -> Self {
        Self::Unauthorized {
            action: action.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn invalid_state(detail: impl Into<String>) -> Self {
        Self::InvalidState {
            detail: detail.into(),
        }
    }
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;

/// 仓储层错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("storage error: {message}")]
    Storage { message: String },

    #[error("record not found")]
    NotFound,

    #[error("conflict: {message}")]
    Conflict { message: String },
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;
