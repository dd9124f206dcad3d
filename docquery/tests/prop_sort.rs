use std::sync::Arc;

use bson::doc;
use docquery::{memory::InMemoryCollection, prelude::*};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_multi_key_sort_non_decreasing(v in proptest::collection::vec((-1_000_000i64..1_000_000, -1_000_000i64..1_000_000), 0..50)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let docs = runtime.block_on(async {
            let collection = InMemoryCollection::new("srt");
            collection
                .insert_many(v.iter().map(|(a, b)| doc! { "a": *a, "b": *b }))
                .await;

            let mut query = Query::from_collection(Arc::new(collection));
            query.sort("a b").unwrap().find().unwrap();
            query.exec().await.unwrap().into_documents().unwrap()
        });

        prop_assert_eq!(docs.len(), v.len());
        for w in docs.windows(2) {
            let (a0, b0) = (w[0].get_i64("a").unwrap(), w[0].get_i64("b").unwrap());
            let (a1, b1) = (w[1].get_i64("a").unwrap(), w[1].get_i64("b").unwrap());
            prop_assert!(a0 < a1 || (a0 == a1 && b0 <= b1));
        }
    }

    #[test]
    fn prop_skip_and_limit_window(len in 0usize..30, skip in 0i64..40, limit in 1i64..40) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let count = runtime.block_on(async {
            let collection = InMemoryCollection::new("page");
            collection.insert_many((0..len as i64).map(|n| doc! { "n": n })).await;

            let mut query = Query::from_collection(Arc::new(collection));
            query.skip(skip).unwrap().limit(limit).unwrap().find().unwrap();
            query.exec().await.unwrap().into_documents().unwrap().len()
        });

        let expected = (len as i64 - skip).clamp(0, limit) as usize;
        prop_assert_eq!(count, expected);
    }
}
