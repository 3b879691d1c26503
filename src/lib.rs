//! 并发 Petri 网执行引擎.
//!
//! 多个线程共享同一个 [`net::Net`]，通过 [`net::Net::fire`] 原子地发射迁移；
//! 无可发射迁移时调用方阻塞，直到其他线程的发射使其候选集可激发或被取消。
//! [`analysis::reachability`] 在标识副本上做可达集搜索。

pub mod analysis;
pub mod config;
pub mod demo;
pub mod net;
pub mod options;
pub mod util;
