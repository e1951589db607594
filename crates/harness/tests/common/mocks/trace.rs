use gridsim_core::device::TraceSink;
use mockall::mock;

mock! {
    pub Trace {}
    impl TraceSink for Trace {
        fn dump(&mut self, time: u64);
        fn close(&mut self);
    }
}
