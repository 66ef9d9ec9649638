pub struct Inventory {
    count: u32,
}

impl Inventory {
    pub fn new() -> Self {
        Inventory { count: 0 }
    }

    pub fn add(&mut self, n: u32) {
        self.count = checked_sum(self.count, n);
    }

    pub fn total(&self) -> u32 {
        self.count
    }
}

fn checked_sum(a: u32, b: u32) -> u32 {
    a.saturating_add(b)
}
