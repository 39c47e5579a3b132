/// Per-scope request numbering used to drop out-of-order fetch responses.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct RequestSequence {
    issued: u64,
    settled: u64,
}

impl RequestSequence {
    /// Issues the next request number for this scope.
    pub fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Returns whether `seq` is the newest request issued for this scope.
    pub fn is_current(&self, seq: u64) -> bool {
        seq == self.issued && seq > self.settled
    }

    /// Marks the newest request as answered.
    pub fn settle(&mut self, seq: u64) {
        if seq == self.issued {
            self.settled = seq;
        }
    }

    pub fn in_flight(&self) -> bool {
        self.settled < self.issued
    }
}
