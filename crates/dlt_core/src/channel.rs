use crate::LoopError;
use dlt_common::buffers::MAX_BUFFER_LEN;
use dlt_common::{LANES, LaneLayout};

/// A transmit/receive channel pair as numbered by the DMA driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPair {
    pub tx: i32,
    pub rx: i32,
}

/// Runtime description of one lane.
///
/// Extends the static [`LaneLayout`] with the buffer sizes chosen at
/// startup. The send length is what each transmission carries; the receive
/// capacity bounds what a receive iteration may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneSpec {
    pub index: usize,
    pub name: &'static str,
    pub channels: ChannelPair,
    pub irq_pin: u32,
    pub send_len: usize,
    pub recv_capacity: usize,
}

impl LaneSpec {
    pub fn from_layout(
        index: usize,
        layout: &LaneLayout,
        send_len: usize,
        recv_capacity: usize,
    ) -> Self {
        Self {
            index,
            name: layout.name,
            channels: ChannelPair {
                tx: layout.tx_channel,
                rx: layout.rx_channel,
            },
            irq_pin: layout.irq_pin,
            send_len,
            recv_capacity,
        }
    }

    /// True if both of this lane's channels appear in the discovered lists.
    pub fn is_available(&self, tx: &[i32], rx: &[i32]) -> bool {
        tx.contains(&self.channels.tx) && rx.contains(&self.channels.rx)
    }
}

/// Builds the specs for every lane of the fixed lane table.
pub fn lane_specs(
    send_len: usize,
    recv_capacity: usize,
) -> Result<[LaneSpec; dlt_common::LANE_COUNT], LoopError> {
    if send_len == 0 || recv_capacity == 0 {
        return Err(LoopError::ZeroLength);
    }
    if let Some(&len) = [send_len, recv_capacity]
        .iter()
        .find(|&&len| len > MAX_BUFFER_LEN)
    {
        return Err(LoopError::TooLarge(len));
    }
    let mut i = 0;
    Ok(LANES.map(|layout| {
        let spec = LaneSpec::from_layout(i, &layout, send_len, recv_capacity);
        i += 1;
        spec
    }))
}

/// Resolves the primary channel pair.
///
/// Without an override the lowest-numbered transmit and receive channels are
/// taken. An override must name channels the driver actually reports.
pub fn select_pair(
    tx: &[i32],
    rx: &[i32],
    requested: Option<ChannelPair>,
) -> Result<ChannelPair, LoopError> {
    let lowest_tx = tx.iter().copied().min().ok_or(LoopError::NoTxChannels)?;
    let lowest_rx = rx.iter().copied().min().ok_or(LoopError::NoRxChannels)?;

    match requested {
        None => Ok(ChannelPair {
            tx: lowest_tx,
            rx: lowest_rx,
        }),
        Some(pair) => {
            if !tx.contains(&pair.tx) {
                return Err(LoopError::UnknownTxChannel(pair.tx));
            }
            if !rx.contains(&pair.rx) {
                return Err(LoopError::UnknownRxChannel(pair.rx));
            }
            Ok(pair)
        }
    }
}
