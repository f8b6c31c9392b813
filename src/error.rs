/// 曝光系統錯誤類型

use thiserror::Error;

/// 曝光計算錯誤
#[derive(Error, Debug)]
pub enum ExposureError {
    /// 網格尺寸必須為正數
    #[error("invalid grid dimension {0}, must be greater than 0")]
    InvalidDimension(i32),

    /// 批次超過允許的射線數量（資源不足），拒絕提交
    #[error("ray batch of {requested} commands exceeds limit of {limit}")]
    BatchTooLarge { requested: usize, limit: usize },

    /// 工作執行緒在交付結果前中斷
    #[error("ray batch lost {missing} of {total} chunks before join")]
    BatchJoin { missing: usize, total: usize },

    /// 批次射線結果與命令數量不一致
    #[error("ray batch returned {got} hits for {expected} commands")]
    ResultCountMismatch { expected: usize, got: usize },

    #[error("worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("config io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ExposureError>;
