//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryRecordStore**: 開発用のレコードストア（失敗注入つき）
//!
//! 本番のストア（DB / API クライアント）はホスト側で `RecordStore` を実装する。

pub mod memory_store;

pub use self::memory_store::InMemoryRecordStore;
