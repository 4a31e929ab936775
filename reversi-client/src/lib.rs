//! 黑白棋玩家客户端
//!
//! 包含:
//! - 对局会话（玩家侧回合契约）
//! - 落子选择与棋盘呈现的接口及默认实现

pub mod session;

pub use session::{
    random_uid, BoardView, FirstValidPicker, MovePicker, NullView, RandomPicker, Session,
    TextView,
};
