use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dupescan::duplicates::DuplicateFinder;
use dupescan::scanner::{FilterConfig, Hasher, Walker};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

// Helper to create a test directory with a specific structure
fn setup_test_dir(depth: usize, files_per_dir: usize) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    create_dir_recursive(temp_dir.path().to_path_buf(), depth, files_per_dir);
    temp_dir
}

fn create_dir_recursive(path: PathBuf, depth: usize, files_per_dir: usize) {
    if depth == 0 {
        return;
    }

    if !path.exists() {
        fs::create_dir_all(&path).expect("Failed to create dir");
    }

    for i in 0..files_per_dir {
        let file_path = path.join(format!("file_{}.txt", i));
        fs::write(file_path, format!("content for file number {i}")).expect("Failed to write file");
    }

    if depth > 1 {
        for i in 0..2 {
            let sub_dir = path.join(format!("dir_{}", i));
            create_dir_recursive(sub_dir, depth - 1, files_per_dir);
        }
    }
}

// 1. Directory Walking Benchmarks
fn bench_walker(c: &mut Criterion) {
    let temp_dir = setup_test_dir(4, 10); // depth 4, 10 files per dir -> roughly 150 files
    let filters = FilterConfig::default();

    c.bench_function("walker_150_files", |b| {
        b.iter(|| {
            let walker = Walker::new(temp_dir.path(), filters.clone());
            let files: Vec<_> = walker.walk().collect();
            black_box(files);
        })
    });
}

// 2. Hashing Benchmarks
fn bench_hasher(c: &mut Criterion) {
    let mut group = c.benchmark_group("hasher");
    let hasher = Hasher::new();

    for size_kb in [1, 1024, 10240] {
        // 1KB, 1MB, 10MB
        let data = vec![b'a'; size_kb * 1024];
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("bench_file.dat");
        fs::write(&file_path, &data).expect("Failed to write bench file");

        group.bench_with_input(format!("full_{}KB", size_kb), &file_path, |b, path| {
            b.iter(|| {
                let hash = hasher.full_hash(path).unwrap();
                black_box(hash);
            });
        });

        group.bench_with_input(format!("partial_{}KB", size_kb), &file_path, |b, path| {
            b.iter(|| {
                let hash = hasher.partial_hash(path).unwrap();
                black_box(hash);
            });
        });
    }
    group.finish();
}

// 3. End-to-end Pipeline Benchmarks
fn bench_pipeline(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();

    // Half duplicates, half unique
    for i in 0..50 {
        let payload = vec![(i % 10) as u8; 4000 + (i % 10)];
        fs::write(temp_dir.path().join(format!("dup_{i}.bin")), &payload).unwrap();
    }
    for i in 0..50 {
        let payload = vec![i as u8; 2000 + i];
        fs::write(temp_dir.path().join(format!("uniq_{i}.bin")), &payload).unwrap();
    }

    c.bench_function("pipeline_100_files", |b| {
        b.iter(|| {
            let finder = DuplicateFinder::new(FilterConfig::default());
            let run = finder.find_duplicates(temp_dir.path()).unwrap();
            black_box(run);
        })
    });
}

criterion_group!(benches, bench_walker, bench_hasher, bench_pipeline);
criterion_main!(benches);
