use crate::types::ClusterID;

/// Decoded link table entry
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Link {
    Free,
    Next(ClusterID),
    /// Any value past the last cluster, bad cluster and end of chain markers alike
    End,
}

impl Link {
    /// Fails on the reserved value 1, which never appears in a sane chain
    pub fn decode(value: u32, num_fat_entries: u32) -> Result<Self, u32> {
        match value {
            0 => Ok(Self::Free),
            1 => Err(value),
            _ if value < num_fat_entries => Ok(Self::Next(value.into())),
            _ => Ok(Self::End),
        }
    }
}

#[cfg(test)]
mod test {
    use super::Link;

    #[test]
    fn test_terminal_values() {
        let n = 0xFF7;
        assert_eq!(Link::decode(0, n), Ok(Link::Free));
        assert_eq!(Link::decode(1, n), Err(1));
        assert_eq!(Link::decode(0xFF6, n), Ok(Link::Next(0xFF6.into())));
        assert_eq!(Link::decode(0xFF7, n), Ok(Link::End));
        assert_eq!(Link::decode(0xFF8, n), Ok(Link::End));
        assert_eq!(Link::decode(0xFFF, n), Ok(Link::End));
    }
}
