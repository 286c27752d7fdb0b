pub mod multi;
pub mod single;

pub use multi::MultiVersionStorage;
pub use single::SingleVersionStorage;

/// The storage a processor instance runs over, chosen once at startup.
pub(crate) enum Store {
    Single(SingleVersionStorage),
    Multi(MultiVersionStorage),
}

impl Store {
    pub fn single(&self) -> &SingleVersionStorage {
        match self {
            Store::Single(s) => s,
            Store::Multi(_) => panic!("engine requires single-version storage"),
        }
    }

    pub fn multi(&self) -> &MultiVersionStorage {
        match self {
            Store::Multi(s) => s,
            Store::Single(_) => panic!("engine requires multi-version storage"),
        }
    }
}
