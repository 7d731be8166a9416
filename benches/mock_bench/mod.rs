use criterion::Criterion;

pub mod root_scan;

pub fn bench(c: &mut Criterion) {
    // Run a single benchmark selected by the GCBRIDGE_BENCH environment variable, like
    // `GCBRIDGE_BENCH="suspend_resume" cargo bench --features mock_test`, or all of them.
    match std::env::var("GCBRIDGE_BENCH") {
        Ok(bench) => match bench.as_str() {
            "suspend_resume" => suspend_resume::bench(c),
            "root_scan" => root_scan::bench(c),
            _ => panic!("Unknown benchmark {:?}", bench),
        },
        Err(_) => {
            suspend_resume::bench(c);
            root_scan::bench(c);
        }
    }
}
