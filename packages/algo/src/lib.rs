//! # pulpit-algo - 经文翻译练习核心逻辑
//!
//! 本 crate 提供纯 Rust 实现的练习调度与数据处理:
//!
//! - **Practice Queue** - 批次出题、失败重练、全部通过即掌握
//! - **Book** - 经过校验的练习条目集合
//! - **Reference De-dup** - 可配置的经文出处去重策略
//! - **Sanitizers** - 模型输出解析、朗读文本清理、静音判定
//!
//! ## 模块结构
//!
//! - [`queue`] - 练习队列状态机
//! - [`book`] - 条目校验
//! - [`dedup`] - 出处去重 (Exact / Normalized / Containment)
//! - [`sanitize`] - 文本清洗
//! - [`types`] - 公共类型和常量
//!
//! ## 使用示例
//!
//! ```rust
//! use pulpit_algo::{Book, GradeResult, GradeStatus, NextBatch, PracticeItem, PracticeQueue};
//!
//! let book = Book::new(vec![
//!     PracticeItem::new(1, "坚定我的约", "establish my covenant"),
//!     PracticeItem::new(2, "属灵的", "spiritual"),
//! ])
//! .unwrap();
//!
//! let mut queue = PracticeQueue::new();
//! queue.load(&book);
//!
//! if let NextBatch::Ready { items, .. } = queue.next_batch(5).unwrap() {
//!     let results = items
//!         .iter()
//!         .map(|item| GradeResult::new(item.id, GradeStatus::Pass, item.target_phrase.clone(), ""));
//!     queue.apply_results(results).unwrap();
//! }
//! assert!(queue.is_mastered());
//! ```

// ============================================================================
// 模块声明
// ============================================================================

pub mod book;
pub mod dedup;
pub mod queue;
pub mod sanitize;
pub mod types;

// ============================================================================
// 重新导出
// ============================================================================

/// 重新导出所有公共类型
pub use types::*;

pub use book::Book;

pub use dedup::{ReferencePolicy, ReferenceSet, UnknownPolicy};

/// 重新导出练习队列
pub use queue::{
    ApplySummary, InvariantViolation, NextBatch, PracticeQueue, Progress, QueueError, QueuePhase,
};
