use burn::tensor::{Tensor, TensorData};
use event_comp::network::{
    ArgumentCompositionNetwork, DenoisingAutoencoder, PairCompositionNetwork,
};
use event_comp::script::{EventBatch, IndexedEvent, SALIENCE_DIM};
use event_comp::vocab::{WordEmbedding, WordVectorStore};
use event_comp::CpuBackend;

type B = CpuBackend;

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

fn to_vec(t: Tensor<B, 2>) -> Vec<f32> {
    t.into_data().convert::<f32>().to_vec().unwrap()
}

fn store_with_rows(rows: Vec<Vec<f32>>) -> WordVectorStore {
    let dim = rows[0].len();
    let words = (0..rows.len()).map(|i| format!("w{}", i)).collect();
    WordVectorStore::new(words, dim, rows.into_iter().flatten().collect()).unwrap()
}

#[test]
fn untrained_pair_network_scores_one_half() {
    let device = Default::default();
    let event_dim = 3;
    let net = PairCompositionNetwork::<B>::new(event_dim, SALIENCE_DIM, &[], 0, &device);

    let n = 4;
    let a = Tensor::<B, 2>::random([n, event_dim], burn::tensor::Distribution::Default, &device);
    let b = Tensor::<B, 2>::random([n, event_dim], burn::tensor::Distribution::Default, &device);
    let (slot, sal) = net.input_tail(&[1, 2, 3, 1], None, &device).unwrap();
    let scores = net.coherence(a, b, slot, sal);
    let values = scores.into_data().convert::<f32>().to_vec::<f32>().unwrap();
    for v in values {
        assert!((v - 0.5).abs() < 1e-6, "untrained coherence {} != 0.5", v);
    }
}

#[test]
fn coherence_stays_in_unit_interval() {
    let device = Default::default();
    let event_dim = 4;
    let mut net = PairCompositionNetwork::<B>::new(event_dim, SALIENCE_DIM, &[5], 1, &device);
    // A non-trivial head so the scores move away from 0.5.
    net.head_w = burn::module::Param::from_tensor(Tensor::from_data(
        TensorData::new(vec![2.0f32, -3.0, 1.0, 0.5, -0.5], [5]),
        &device,
    ));

    let n = 8;
    let a = Tensor::<B, 2>::random([n, event_dim], burn::tensor::Distribution::Default, &device)
        .mul_scalar(10.0);
    let b = Tensor::<B, 2>::random([n, event_dim], burn::tensor::Distribution::Default, &device)
        .mul_scalar(-10.0);
    let (slot, sal) = net.input_tail(&[1; 8], None, &device).unwrap();
    let values = net
        .coherence(a, b, slot, sal)
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .unwrap();
    for v in values {
        assert!((0.0..=1.0).contains(&v), "coherence {} outside [0, 1]", v);
    }
}

#[test]
fn salience_width_mismatch_is_rejected() {
    let device = Default::default();
    let net = PairCompositionNetwork::<B>::new(3, SALIENCE_DIM, &[], 0, &device);
    let bad = vec![0.0f32; SALIENCE_DIM + 1];
    assert!(net.input_tail(&[1], Some(&bad), &device).is_err());
}

/// With one layer whose weight stacks four small identity blocks, the
/// projection is approximately the mean of the slot vectors (tanh is close
/// to linear near zero).
#[test]
fn near_linear_projection_approximates_mean_pooling() {
    let device = Default::default();
    let dim = 4;
    let eps = 0.02f32;

    let mut w = vec![0.0f32; 4 * dim * dim];
    for block in 0..4 {
        for j in 0..dim {
            w[(block * dim + j) * dim + j] = eps / 4.0;
        }
    }
    let layer = DenoisingAutoencoder::<B>::from_parts(
        Tensor::from_data(TensorData::new(w, [4 * dim, dim]), &device),
        Tensor::zeros([dim], &device),
        Tensor::zeros([4 * dim], &device),
    );
    let mut net = ArgumentCompositionNetwork::<B>::new(dim, &[dim], 0, &device).unwrap();
    net.stack.layers[0] = layer;

    let rows = vec![
        vec![1.0, 0.0, 0.0, 0.0],
        vec![0.0, 1.0, 0.0, 0.0],
        vec![0.0, 0.0, 1.0, 0.0],
        vec![0.0, 0.0, 0.0, 1.0],
    ];
    let store = store_with_rows(rows.clone());
    let embedding = WordEmbedding::<B>::from_store(&store, &device);

    let mut batch = EventBatch::default();
    batch.push(IndexedEvent::new(0, 1, 2, 3));
    let projected = to_vec(net.project(&embedding, &batch, &device));

    let mean: Vec<f32> = (0..dim)
        .map(|j| rows.iter().map(|r| r[j]).sum::<f32>() / 4.0)
        .collect();
    assert!(
        cosine(&projected, &mean) > 0.999,
        "projection {:?} is not aligned with the slot mean {:?}",
        projected,
        mean
    );
}

#[test]
fn empty_slots_use_the_learned_vectors() {
    let device = Default::default();
    let dim = 3;
    let store = store_with_rows(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
    let embedding = WordEmbedding::<B>::from_store(&store, &device);
    let net = ArgumentCompositionNetwork::<B>::new(dim, &[dim], 9, &device).unwrap();

    let mut batch = EventBatch::default();
    batch.push(IndexedEvent::new(0, 1, -1, -1));
    let x = to_vec(net.compose_input(&embedding, &batch, &device));
    assert_eq!(x.len(), 4 * dim);

    // Slots 3 and 4 fall back to the zero-initialised empty vectors; the
    // filled slots carry the normalised store rows.
    let row0 = store.vector(0).unwrap();
    let row1 = store.vector(1).unwrap();
    for j in 0..dim {
        assert!((x[j] - row0[j]).abs() < 1e-6);
        assert!((x[dim + j] - row1[j]).abs() < 1e-6);
        assert_eq!(x[2 * dim + j], 0.0);
        assert_eq!(x[3 * dim + j], 0.0);
    }
}

#[test]
fn normalized_projection_has_unit_rows() {
    let device = Default::default();
    let dim = 3;
    let store = store_with_rows(vec![vec![1.0, 0.5, 0.2], vec![0.3, 0.9, 0.1]]);
    let embedding = WordEmbedding::<B>::from_store(&store, &device);
    let net = ArgumentCompositionNetwork::<B>::new(dim, &[dim], 2, &device).unwrap();

    let mut batch = EventBatch::default();
    batch.push(IndexedEvent::new(0, 1, -1, 0));
    batch.push(IndexedEvent::new(1, 0, 1, -1));
    let rows = to_vec(net.project_normalized(&embedding, &batch, &device));
    for row in rows.chunks(dim) {
        let norm: f32 = row.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4, "row norm {} != 1", norm);
    }
}

#[test]
fn encoder_reconstruction_has_matching_shape() {
    let device = Default::default();
    let layer = DenoisingAutoencoder::<B>::new(6, 4, 11, &device);
    let x = Tensor::<B, 2>::random([5, 6], burn::tensor::Distribution::Default, &device);
    let h = layer.encode(x.clone());
    assert_eq!(h.dims(), [5, 4]);
    let x_hat = layer.reconstruct(h);
    assert_eq!(x_hat.dims(), [5, 6]);

    let loss = layer
        .reconstruction_loss(x.clone(), x)
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .unwrap()[0];
    assert!(loss.is_finite());
    assert!(loss >= 0.0);
}
