//! # 共享 Petri 网（输入 / 输出 / 抑制 / 复位弧）
//!
//! 标识 `M` 为库所到非负整数的映射，缺省库所取 0。对迁移 `t`：
//!
//! * `t` **可激发** 当且仅当：
//!   1. 对每条输入弧 `(p, w)`：`M[p] ≥ w`；
//!   2. 对每条抑制弧 `p`：`M[p] = 0`；
//! * `t` **发射** 时依次扣除输入权重、加上输出权重，最后把复位弧所指库所置 0；
//!   因此既是输出又被复位的库所发射后为 0。
//!
//! [`Net::fire`] 接受一个有序候选集，选取其中第一个可激发的迁移原子地发射；
//! 若均不可激发则阻塞，直到其他线程的发射使之可激发（或经
//! [`Net::fire_cancellable`] 被取消）。公平模式下等待者按到达顺序被唤醒。
//!
//! ## 示例
//!
//! ```rust
//! use petri_sync::net::*;
//!
//! let net = Net::new([("p0", 1)], true);
//! let t0 = Transition::builder("t0")
//!     .input("p0", 1)
//!     .output("p1", 1)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(net.fire(&[t0.clone()]).unwrap(), t0);
//! let marking = net.snapshot();
//! assert_eq!(marking.tokens(&"p0"), 0);
//! assert_eq!(marking.tokens(&"p1"), 1);
//! assert_eq!(net.reachable(&[t0]).len(), 1);
//! ```

pub mod cancel;
pub mod core;
pub mod ids;
pub mod marking;
pub mod structure;

pub use cancel::CancelToken;
pub use self::core::{FireError, Net};
pub use ids::{PlaceKey, WaiterId};
pub use marking::Marking;
pub use structure::{
    ArcKind, InhibitorArc, InputArc, InvalidTransition, OutputArc, ResetArc, Transition,
    TransitionBuilder, Weight,
};
