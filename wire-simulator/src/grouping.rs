//! Readout-board (motherboard) grouping of channels.
//!
//! Channel `c` belongs to board `c / channels_per_board`. Whenever a board
//! is selected, every one of its channels is digitised.

use std::{collections::BTreeSet, num::NonZeroU32, ops::Range};
use wiresim_common::{BoardIndex, Channel};

/// Boards to digitise for one event, in ascending order.
///
/// Without suppression every board overlapping `boundary` is selected,
/// including a partially covered last board. With suppression only boards
/// holding a signal channel inside `boundary` are.
pub(crate) fn select_boards(
    signal_channels: impl IntoIterator<Item = Channel>,
    boundary: &Range<Channel>,
    channels_per_board: NonZeroU32,
    suppress_no_signal: bool,
) -> BTreeSet<BoardIndex> {
    let per_board = channels_per_board.get();
    if boundary.is_empty() {
        return BTreeSet::new();
    }
    if suppress_no_signal {
        signal_channels
            .into_iter()
            .filter(|channel| boundary.contains(channel))
            .map(|channel| channel / per_board)
            .collect()
    } else {
        (boundary.start / per_board..boundary.end.div_ceil(per_board)).collect()
    }
}

/// Channels of `board` that exist in a detector of `num_channels` channels.
pub(crate) fn board_channels(
    board: BoardIndex,
    channels_per_board: NonZeroU32,
    num_channels: Channel,
) -> Range<Channel> {
    let per_board = channels_per_board.get();
    let start = board.saturating_mul(per_board).min(num_channels);
    let end = start.saturating_add(per_board).min(num_channels);
    start..end
}
