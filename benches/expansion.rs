use criterion::{criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use seedgrow::nn::{Agent, DiffusionEncoder, NodeIndicators, PolicyInput, Segment};
use seedgrow::Graph;

/// Grid graph with `side * side` nodes
fn grid(side: usize) -> Graph {
    let mut edges = Vec::new();
    for r in 0..side {
        for c in 0..side {
            let v = r * side + c;
            if c + 1 < side {
                edges.push((v, v + 1));
            }
            if r + 1 < side {
                edges.push((v, v + side));
            }
        }
    }
    Graph::from_edges(&edges).unwrap()
}

fn bench_diffusion(c: &mut Criterion) {
    let graph = grid(100);
    let encoder = DiffusionEncoder::new(&graph, 3, 0.85);
    let indicators = NodeIndicators::new((0..32).map(|i| vec![i * 250, i * 250 + 1]).collect());

    c.bench_function("diffusion_encode_32", |b| {
        b.iter(|| encoder.encode(&indicators).unwrap())
    });
}

fn bench_agent_forward(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0);
    let agent = Agent::new(64, &mut rng);

    // 32 episodes, 12 boundary candidates and 8 community rows each
    let mut segments = Vec::new();
    for e in 0..32 {
        let start = e * 20;
        segments.push(Segment::new(start, start + 12, start + 20).unwrap());
    }
    let rows = 32 * 20;
    let input = PolicyInput {
        seed_feats: (0..rows).map(|i| (i % 7) as f32 * 0.1).collect(),
        node_feats: (0..rows).map(|i| (i % 5) as f32 * 0.2).collect(),
        segments,
    };

    c.bench_function("agent_forward_32x20", |b| {
        b.iter(|| agent.forward(&input).unwrap())
    });
}

criterion_group!(benches, bench_diffusion, bench_agent_forward);
criterion_main!(benches);
