pub mod gantt_board;
pub mod notifications;
pub mod theme;
pub mod toolbar;
