use std::fmt;

/// An immutable item name, compared by value.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Item(Box<[u8]>);

impl Item {
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[u8]> for Item {
    fn from(bytes: &[u8]) -> Self {
        Item(bytes.into())
    }
}

impl From<Vec<u8>> for Item {
    fn from(bytes: Vec<u8>) -> Self {
        Item(bytes.into_boxed_slice())
    }
}

impl From<&str> for Item {
    fn from(s: &str) -> Self {
        Item(s.as_bytes().into())
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// Items of one input line, in input order.
pub type Transaction = Vec<Item>;

pub type TransactionsList = Vec<Transaction>;

/// An item together with its support count.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemCount {
    pub item: Item,
    pub count: u64,
}

impl ItemCount {
    pub fn new(item: impl Into<Item>, count: u64) -> Self {
        Self {
            item: item.into(),
            count,
        }
    }
}
