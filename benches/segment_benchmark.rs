use criterion::{black_box, criterion_group, criterion_main, Criterion};
use wordseg::{train, DefaultContextGenerator, Sample, Segmenter, TrainingParams, WordSegmenter};

const WORDS: [&str; 12] = [
    "我", "喜欢", "自然语言处理", "。", "他们", "研究", "中文", "分词", "你", "模型", "很", "好",
];

fn line(i: usize) -> String {
    let words: Vec<&str> = (0..8).map(|j| WORDS[(i * 7 + j * 5 + i / 3) % WORDS.len()]).collect();
    words.join(" ")
}

fn segment_benchmark(c: &mut Criterion) {
    let samples: Vec<Sample> = (0..200).map(|i| Sample::parse(&line(i)).expect("failed to parse sample")).collect();
    let mut params = TrainingParams::default();
    params.iterations = 20;
    params.cutoff = 1;
    let model = train(&samples, &params, &DefaultContextGenerator).expect("failed to train");
    let sentences: Vec<String> = (0..100).map(|i| line(i + 1000).replace(' ', "")).collect();

    for size in [1, 3, 8] {
        let segmenter = Segmenter::new(&model, Box::new(DefaultContextGenerator)).with_beam_size(size);
        c.bench_function(&format!("segment_beam_{size}"), |b| {
            b.iter(|| {
                for s in &sentences {
                    black_box(segmenter.segment(black_box(s)).expect("failed to segment"));
                }
            })
        });
    }
}

criterion_group!(benchmarks, segment_benchmark);
criterion_main!(benchmarks);
