//! 对局会话
//!
//! 玩家侧的回合契约：收到棋盘则确认，收到行棋权则落子，
//! 收到结果则结束。落子选择与棋盘呈现通过 trait 注入，
//! 输入设备与显示屏都挂在这两个接口后面。

use rand::Rng;
use tracing::{debug, warn};

use protocol::{encode_move, Board, ClientChannel, GameResult, Tag, Tile};

/// 落子选择器，由输入设备或策略实现
pub trait MovePicker: Send {
    /// 在合法落子中选择一个，返回 (row, col)
    ///
    /// 只会在 `color` 存在合法落子时调用。
    fn pick(&mut self, board: &Board, color: Tile) -> (usize, usize);
}

/// 总是选择第一个合法落子（按行、列顺序）
pub struct FirstValidPicker;

impl MovePicker for FirstValidPicker {
    fn pick(&mut self, board: &Board, color: Tile) -> (usize, usize) {
        let row = board.rows_with_valid_moves(color)[0];
        let col = board.tiles_with_valid_move(color, row)[0];
        (row, col)
    }
}

/// 在合法落子中随机挑选
pub struct RandomPicker;

impl MovePicker for RandomPicker {
    fn pick(&mut self, board: &Board, color: Tile) -> (usize, usize) {
        let mut rng = rand::thread_rng();
        let rows = board.rows_with_valid_moves(color);
        let row = rows[rng.gen_range(0..rows.len())];
        let cols = board.tiles_with_valid_move(color, row);
        let col = cols[rng.gen_range(0..cols.len())];
        (row, col)
    }
}

/// 棋盘呈现，由显示设备实现
pub trait BoardView: Send {
    /// 重绘棋盘
    fn draw(&mut self, board: &Board);

    /// 呈现对局结果
    fn game_over(&mut self, result: GameResult);
}

/// 不做任何呈现
pub struct NullView;

impl BoardView for NullView {
    fn draw(&mut self, _board: &Board) {}

    fn game_over(&mut self, _result: GameResult) {}
}

/// 把棋盘打印到标准输出
pub struct TextView;

impl BoardView for TextView {
    fn draw(&mut self, board: &Board) {
        for line in board.serialize().split(protocol::ROW_SEPARATOR) {
            println!("{}", line);
        }
        println!();
    }

    fn game_over(&mut self, result: GameResult) {
        match result {
            GameResult::BlackWins => println!("黑方胜"),
            GameResult::WhiteWins => println!("白方胜"),
            GameResult::Draw => println!("平局"),
        }
    }
}

/// 生成随机玩家标识
pub fn random_uid() -> String {
    format!("player-{:08x}", rand::thread_rng().gen::<u32>())
}

/// 玩家侧对局会话
pub struct Session<P, V> {
    channel: ClientChannel,
    picker: P,
    view: V,
    board: Board,
}

impl<P: MovePicker, V: BoardView> Session<P, V> {
    /// 创建会话
    pub fn new(channel: ClientChannel, picker: P, view: V) -> Session<P, V> {
        Session {
            channel,
            picker,
            view,
            board: Board::new(),
        }
    }

    /// 运行会话直到收到对局结果
    pub async fn run(&mut self) -> protocol::Result<GameResult> {
        loop {
            // 每个逻辑回合至多收取一条消息，避免乱序消费
            let message = self.channel.receive_any().await;
            match message.tag {
                Tag::Board => {
                    match Board::deserialize(&message.content) {
                        Ok(board) => {
                            self.board = board;
                            self.view.draw(&self.board);
                        }
                        // 保留上一次的棋盘
                        Err(err) => warn!("棋盘内容无法解析: {}", err),
                    }
                    self.channel.send_to_arbiter(Tag::BoardAck, "").await?;
                }
                Tag::YourTurn => {
                    let color = message.content.chars().next().and_then(Tile::from_char);
                    let Some(color) = color.filter(|&c| c != Tile::Empty) else {
                        warn!("行棋权内容无法解析: {:?}", message.content);
                        continue;
                    };
                    if !self.board.has_any_valid_move(color) {
                        warn!("收到行棋权但本地棋盘上没有合法落子，忽略");
                        continue;
                    }
                    let (row, col) = self.picker.pick(&self.board, color);
                    debug!("{:?} 选择落子 ({}, {})", color, row, col);
                    self.channel
                        .send_to_arbiter(Tag::Place, &encode_move(row, col))
                        .await?;
                }
                Tag::Winner => {
                    let result = message.content.chars().next().and_then(GameResult::from_char);
                    let Some(result) = result else {
                        warn!("结果内容无法解析: {:?}", message.content);
                        continue;
                    };
                    self.view.game_over(result);
                    return Ok(result);
                }
                tag => debug!("忽略意外的消息标签: {}", tag),
            }
        }
    }

    /// 结束会话并宣告离线
    pub async fn close(self) -> protocol::Result<()> {
        self.channel.close().await
    }
}
