use std::path::PathBuf;
use stylerec::services::{collaborative_cache, content_cache};
use stylerec::*;

const STYLES: &str = "\
id,gender,masterCategory,subCategory,articleType,baseColour,season,year,usage,productDisplayName
1,Men,Apparel,Topwear,Tshirts,Blue,Summer,2011,Casual,Nike Men Blue Tshirt
2,Men,Apparel,Topwear,Tshirts,Blue,Summer,2011,Casual,Nike Men Blue Round Neck Tshirt
3,Men,Apparel,Topwear,Shirts,White,Fall,2012,Formal,Arrow Men White Formal Shirt
4,Women,Apparel,Topwear,Tops,Red,Summer,2012,Casual,Vero Moda Women Red Top
5,Women,Footwear,Shoes,Heels,Black,Winter,2013,Party,Catwalk Women Black Heels
6,Women,Footwear,Shoes,Heels,Black,Winter,2013,Party,Catwalk Women Black Heels
7,Men,Footwear,Shoes,Casual Shoes,White,Summer,2012,Casual,Puma Men White Shoes
8,Women,Accessories,Bags,Handbags,Brown,Fall,2011,Casual,Lino Perros Women Brown Handbag
";

const RATINGS: &str = "\
user_id,product_id,rating
u1,1,5
u1,2,4
u1,3,1
u1,4,3
u2,1,4
u2,2,5
u2,3,2
u3,1,1
u3,2,2
u3,3,5
u3,5,4
u4,4,4
u4,5,5
u5,6,3
u5,7,2
u6,8,4
";

struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
    styles: PathBuf,
    ratings: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let styles = root.join("styles.csv");
        let ratings = root.join("ratings.csv");
        std::fs::write(&styles, STYLES).unwrap();
        std::fs::write(&ratings, RATINGS).unwrap();
        Self {
            _dir: dir,
            root,
            styles,
            ratings,
        }
    }

    fn config(&self) -> Config {
        let mut config = Config::default();
        config.data.ratings_path = self.ratings.clone();
        config.data.catalog_path = self.styles.clone();
        config.snapshot.dir = self.root.join("models");
        config
    }

    fn fit_cf(&self) -> ItemBasedCf {
        let mut cf = ItemBasedCf::new(&self.config());
        cf.fit(&self.ratings, Some(self.styles.as_path())).unwrap();
        cf
    }

    fn fit_content(&self) -> ContentRecommender {
        let mut content = ContentRecommender::new(&self.config());
        content.fit(&self.styles).unwrap();
        content
    }
}

#[test]
fn test_similarity_matrix_invariants() {
    let fixture = Fixture::new();
    let cf = fixture.fit_cf();
    let matrix = cf.similarity_matrix().unwrap();
    let values = matrix.values();
    let n = matrix.len();
    assert_eq!(n, 8);

    for i in 0..n {
        assert_eq!(values[[i, i]], 1.0);
        for j in 0..n {
            assert_eq!(values[[i, j]], values[[j, i]]);
            if i != j {
                assert!((-1.0..=0.99).contains(&values[[i, j]]), "{} {} {}", i, j, values[[i, j]]);
            }
        }
    }
}

#[test]
fn test_sparse_pair_rules_with_catalog() {
    let fixture = Fixture::new();
    let cf = fixture.fit_cf();
    let matrix = cf.similarity_matrix().unwrap();

    // 5 and 6 share no raters; identical metadata caps at 0.7
    assert!((matrix.get(5, 6).unwrap() - 0.7).abs() < 1e-12);
    // 3 and 5 have a single common rater (u3: 5 and 4)
    assert!((matrix.get(3, 5).unwrap() - 0.4).abs() < 1e-12);
    // 1 and 2: three raters, strongly aligned
    assert!(matrix.get(1, 2).unwrap() > 0.8);
}

#[test]
fn test_fit_is_deterministic() {
    let fixture = Fixture::new();
    let first = fixture.fit_cf();
    let second = fixture.fit_cf();
    assert_eq!(
        first.similarity_matrix().unwrap().values(),
        second.similarity_matrix().unwrap().values()
    );
}

#[test]
fn test_find_similar_items_filters_scores() {
    let fixture = Fixture::new();
    let cf = fixture.fit_cf();
    for item in 1..=8 {
        let similar = cf.find_similar_items(item, 10).unwrap();
        assert!(similar.iter().all(|(id, s)| *id != item && *s > 0.0 && *s < 1.0));
        assert!(similar.windows(2).all(|w| w[0].1 >= w[1].1));
    }
    assert!(matches!(
        cf.find_similar_items(404, 10),
        Err(RecommenderError::UnknownItem(404))
    ));
}

#[test]
fn test_predictions_and_cold_start() {
    let fixture = Fixture::new();
    let cf = fixture.fit_cf();
    for user in ["u1", "u2", "u3", "u4", "nobody"] {
        for item in 1..=9 {
            let rating = cf.predict_rating(user, item).unwrap();
            assert!((1.0..=5.0).contains(&rating));
        }
    }
    assert_eq!(cf.predict_rating("nobody", 99).unwrap(), 3.0);

    let recs = cf.get_item_recommendations("u2", 3, 10).unwrap();
    assert!(recs.iter().all(|r| ![1, 2, 3].contains(&r.item_id())));
    assert!(!recs[0].item.product_display_name.is_empty());

    // count x mean: item 2 totals 11 over three ratings, item 1 totals 10
    let popular = cf.get_item_recommendations("nobody", 2, 10).unwrap();
    assert_eq!(popular[0].item_id(), 2);
}

#[test]
fn test_cf_snapshot_round_trip() {
    let fixture = Fixture::new();
    let cf = fixture.fit_cf();
    let path = fixture.config().snapshot.collaborative_path();
    cf.save_snapshot(&path).unwrap();

    let restored = ItemBasedCf::load_snapshot(&path).unwrap();
    assert_eq!(
        restored.similarity_matrix().unwrap(),
        cf.similarity_matrix().unwrap()
    );
    for item in 1..=8 {
        assert_eq!(
            restored.find_similar_items(item, 5).unwrap(),
            cf.find_similar_items(item, 5).unwrap()
        );
    }
    assert_eq!(
        restored.get_item_recommendations("nobody", 3, 10).unwrap(),
        cf.get_item_recommendations("nobody", 3, 10).unwrap()
    );
    assert_eq!(restored.stats().unwrap(), cf.stats().unwrap());
}

#[test]
fn test_content_duplicates_never_reach_one() {
    let fixture = Fixture::new();
    let content = fixture.fit_content();

    // 5 and 6 are identical listings; 1 and 2 share every attribute
    let recs = content.get_recommendations(5, 3, true).unwrap();
    assert_eq!(recs[0].item_id(), 6);
    assert!(recs[0].score.unwrap() <= 0.99);

    let recs = content.get_recommendations(1, 7, true).unwrap();
    assert_eq!(recs.len(), 7);
    assert!(recs.iter().all(|r| r.item_id() != 1 && r.score.unwrap() <= 0.99));
}

#[test]
fn test_content_scores_symmetric() {
    let fixture = Fixture::new();
    let content = fixture.fit_content();
    let score = |a: ItemId, b: ItemId| -> f64 {
        content
            .get_recommendations(a, 10, true)
            .unwrap()
            .into_iter()
            .find(|r| r.item_id() == b)
            .and_then(|r| r.score)
            .unwrap()
    };
    for a in 1..=8 {
        for b in 1..=8 {
            if a != b {
                assert_eq!(score(a, b), score(b, a));
            }
        }
    }
}

#[test]
fn test_content_snapshot_round_trip() {
    let fixture = Fixture::new();
    let content = fixture.fit_content();
    let path = fixture.config().snapshot.content_path();
    content.save_snapshot(&path).unwrap();

    let restored = ContentRecommender::load_snapshot(&path).unwrap();
    for item in 1..=8 {
        assert_eq!(
            restored.get_recommendations(item, 5, true).unwrap(),
            content.get_recommendations(item, 5, true).unwrap()
        );
    }
    assert_eq!(restored.item_details(4).unwrap().base_colour, "Red");
}

#[test]
fn test_legacy_split_snapshot_requires_sidecar() {
    let fixture = Fixture::new();
    let content = fixture.fit_content();
    let path = fixture.root.join("models/content_based_model.bin");
    let sidecar = content.save_split_snapshot(&path).unwrap();
    assert!(sidecar.ends_with("content_based_model_features.bin"));

    let restored = ContentRecommender::load_snapshot(&path).unwrap();
    assert_eq!(
        restored.get_recommendations(3, 4, true).unwrap(),
        content.get_recommendations(3, 4, true).unwrap()
    );

    std::fs::remove_file(&sidecar).unwrap();
    assert!(matches!(
        ContentRecommender::load_snapshot(&path),
        Err(RecommenderError::SnapshotIncomplete { .. })
    ));
}

#[test]
fn test_wrong_engine_snapshot_is_rejected() {
    let fixture = Fixture::new();
    let path = fixture.root.join("models/content.bin");
    fixture.fit_content().save_snapshot(&path).unwrap();
    assert!(matches!(
        ItemBasedCf::load_snapshot(&path),
        Err(RecommenderError::SnapshotFormat { .. })
    ));
}

#[test]
fn test_process_cache_serves_one_instance() {
    let fixture = Fixture::new();
    let config = fixture.config();
    fixture.fit_cf().save_snapshot(&config.snapshot.collaborative_path()).unwrap();
    fixture.fit_content().save_snapshot(&config.snapshot.content_path()).unwrap();

    let state = AppState::new(config.clone());
    let first = state.collaborative().unwrap();
    let second = state.collaborative().unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert!(state.content().unwrap().is_fitted());

    let cf_path = config.snapshot.collaborative_path();
    let reloaded = collaborative_cache().reload(&cf_path).unwrap();
    assert!(!std::sync::Arc::ptr_eq(&first, &reloaded));
    assert!(collaborative_cache().evict(&cf_path));
    assert!(content_cache().evict(&config.snapshot.content_path()));
}

#[test]
fn test_engines_share_the_similarity_contract() {
    let fixture = Fixture::new();
    let engines: Vec<Box<dyn SimilarityEngine>> = vec![
        Box::new(fixture.fit_cf()),
        Box::new(fixture.fit_content()),
    ];
    for engine in &engines {
        assert!(engine.is_fitted());
        let similar = engine.similar_items(1, 3).unwrap();
        assert!(similar.len() <= 3);
        assert!(similar.iter().all(|(id, _)| *id != 1), "{}", engine.engine_name());
        for item in 1..=8 {
            let similar = engine.similar_items(item, 10).unwrap();
            assert!(
                similar.iter().all(|(_, s)| *s > 0.0 && *s < 1.0),
                "{} {:?}",
                engine.engine_name(),
                similar
            );
        }
    }
}

#[test]
fn test_content_fit_is_deterministic() {
    let fixture = Fixture::new();
    let first = fixture.fit_content();
    let second = fixture.fit_content();
    assert_eq!(first.feature_matrix().unwrap(), second.feature_matrix().unwrap());
    for item in 1..=8 {
        assert_eq!(
            first.get_recommendations(item, 7, true).unwrap(),
            second.get_recommendations(item, 7, true).unwrap()
        );
    }
}
