use core::fmt;

/// One wire communication error type.
#[derive(Debug, PartialEq, Eq)]
pub enum OneWireError<E> {
    /// Encapsulates the error type from the underlying hardware.
    Other(E),
    /// No presence pulse was detected after a reset.
    NoDevicePresent,
    /// The bus line is held low and cannot be released.
    ShortCircuit,
    /// The operation is not implemented by this bus master, such as a triplet read.
    Unimplemented,
}

impl<E> From<E> for OneWireError<E> {
    fn from(other: E) -> Self {
        Self::Other(other)
    }
}

impl<E: fmt::Debug> fmt::Display for OneWireError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(e) => write!(f, "bus master error: {e:?}"),
            Self::NoDevicePresent => f.write_str("no presence pulse on the 1-Wire bus"),
            Self::ShortCircuit => f.write_str("1-Wire bus line is shorted low"),
            Self::Unimplemented => f.write_str("operation not implemented by the bus master"),
        }
    }
}
