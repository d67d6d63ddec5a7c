//! Channel roles and default channel layouts
//!
//! A channel's role only selects its weight in the block power sum; it never
//! changes how the channel is filtered.

/// Spatial role of an audio channel
///
/// The `M`/`U`/`T`/`B` positions follow ITU-R BS.2051 naming: mid, upper, top and
/// bottom layers, `p`/`m` for plus/minus azimuth in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Excluded from the loudness measurement (LFE, unused slots)
    Unused,
    Left,
    Right,
    Center,
    LeftSurround,
    RightSurround,
    /// A mono signal played back over two speakers; counted twice
    DualMono,
    MpSC,
    MmSC,
    Mp060,
    Mm060,
    Mp090,
    Mm090,
    Mp135,
    Mm135,
    Mp180,
    Up000,
    Up030,
    Um030,
    Up045,
    Um045,
    Up090,
    Um090,
    Up110,
    Um110,
    Up135,
    Um135,
    Up180,
    Tp000,
    Bp000,
    Bp045,
    Bm045,
}

impl Channel {
    /// Loudness weight of this channel, or `None` if it is excluded
    pub fn weight(self) -> Option<f64> {
        match self {
            Self::Unused => None,
            Self::LeftSurround
            | Self::RightSurround
            | Self::Mp060
            | Self::Mm060
            | Self::Mp090
            | Self::Mm090
            | Self::Up090
            | Self::Um090
            | Self::Up110
            | Self::Um110
            | Self::Up135
            | Self::Um135
            | Self::Up180
            | Self::Tp000 => Some(1.41),
            Self::DualMono => Some(2.0),
            _ => Some(1.0),
        }
    }

    /// Role used for channel `index` when no layout is known
    fn fallback(index: usize) -> Self {
        match index {
            0 => Self::Left,
            1 => Self::Right,
            2 => Self::Center,
            4 => Self::LeftSurround,
            5 => Self::RightSurround,
            _ => Self::Unused,
        }
    }
}

/// Ordered channel roles, one per interleaved channel index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMap(Vec<Channel>);

impl ChannelMap {
    /// Create a map from explicit roles
    pub fn new(channels: Vec<Channel>) -> Self {
        Self(channels)
    }

    /// Default layout for a channel count
    ///
    /// | channels | layout |
    /// |---|---|
    /// | 1 | C |
    /// | 2 | L R |
    /// | 4 | L R Ls Rs |
    /// | 5 | L R C Ls Rs |
    /// | 6 | L R C LFE Ls Rs |
    ///
    /// Other counts map index 0..=5 to L R C (unused) Ls Rs and everything beyond to unused.
    pub fn default_for(channels: u32) -> Self {
        use Channel::*;
        let layout = match channels {
            1 => vec![Center],
            2 => vec![Left, Right],
            4 => vec![Left, Right, LeftSurround, RightSurround],
            5 => vec![Left, Right, Center, LeftSurround, RightSurround],
            6 => vec![Left, Right, Center, Unused, LeftSurround, RightSurround],
            n => (0..n as usize).map(Channel::fallback).collect(),
        };
        Self(layout)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Channel] {
        &self.0
    }

    /// Per-channel weights, `None` for excluded channels
    pub fn weights(&self) -> Vec<Option<f64>> {
        self.0.iter().map(|c| c.weight()).collect()
    }
}

impl From<Vec<Channel>> for ChannelMap {
    fn from(channels: Vec<Channel>) -> Self {
        Self::new(channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_weights() {
        assert_eq!(Channel::Unused.weight(), None);
        assert_eq!(Channel::Left.weight(), Some(1.0));
        assert_eq!(Channel::Center.weight(), Some(1.0));
        assert_eq!(Channel::Up000.weight(), Some(1.0));
        assert_eq!(Channel::LeftSurround.weight(), Some(1.41));
        assert_eq!(Channel::Mm090.weight(), Some(1.41));
        assert_eq!(Channel::Tp000.weight(), Some(1.41));
        assert_eq!(Channel::DualMono.weight(), Some(2.0));
    }

    #[test]
    fn test_default_layouts() {
        use Channel::*;
        assert_eq!(ChannelMap::default_for(1).as_slice(), &[Center]);
        assert_eq!(ChannelMap::default_for(2).as_slice(), &[Left, Right]);
        assert_eq!(
            ChannelMap::default_for(6).as_slice(),
            &[Left, Right, Center, Unused, LeftSurround, RightSurround]
        );
        assert!(ChannelMap::default_for(0).is_empty());
    }

    #[test]
    fn test_fallback_layout() {
        use Channel::*;
        assert_eq!(ChannelMap::default_for(3).as_slice(), &[Left, Right, Center]);
        assert_eq!(
            ChannelMap::default_for(8).as_slice(),
            &[Left, Right, Center, Unused, LeftSurround, RightSurround, Unused, Unused]
        );
    }

    #[test]
    fn test_weights_follow_map() {
        let map = ChannelMap::from(vec![Channel::Left, Channel::Unused, Channel::RightSurround]);
        assert_eq!(map.weights(), vec![Some(1.0), None, Some(1.41)]);
    }
}
