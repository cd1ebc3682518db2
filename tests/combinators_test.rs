mod common;

#[cfg(test)]
mod tests {
    use super::common::*;
    use promise_dispatch::{
        finalize_all, finalize_any, flatten, join_all, join_either, race_any, race_either, Either,
        Promise,
    };
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn join_all_collects_in_input_order() {
        init_test_logging();
        let joined = join_all([Promise::<i32, String>::resolved(1), Promise::resolved(2)]);
        assert_eq!(joined.current_value(), Some(vec![1, 2]));
    }

    #[test]
    fn join_all_first_error_wins() {
        let joined = join_all([Promise::<i32, String>::resolved(1), Promise::rejected("E".into())]);
        assert_eq!(joined.current_error().as_deref(), Some("E"));

        let sources: Vec<_> = (0..3).map(|_| sync_source::<i32, String>()).collect();
        let joined = join_all(sources.iter().map(|source| source.promise()));
        sources[2].reject("first".into());
        sources[0].reject("second".into());
        sources[1].resolve(1);
        assert_eq!(joined.current_error().as_deref(), Some("first"));
    }

    #[test]
    fn join_all_empty_resolves_immediately() {
        let joined = join_all(Vec::<Promise<i32, String>>::new());
        assert_eq!(joined.current_value(), Some(vec![]));
    }

    #[test]
    fn join_all_across_threads_keeps_order() {
        let sources: Vec<_> = (0..8).map(|_| sync_source::<usize, ()>()).collect();
        let joined = join_all(sources.iter().map(|source| source.promise()));
        let producers: Vec<_> = sources
            .into_iter()
            .enumerate()
            .rev()
            .map(|(i, source)| {
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis((8 - i as u64) * 2));
                    source.resolve(i * 10)
                })
            })
            .collect();
        for producer in producers {
            producer.join().expect("producer panicked");
        }
        assert_eq!(
            joined.wait().unwrap(),
            Ok((0..8).map(|i| i * 10).collect::<Vec<_>>())
        );
    }

    #[test]
    fn race_any_takes_first_value() {
        let pending = sync_source::<i32, String>();
        let raced = race_any([pending.promise(), Promise::resolved(2)]);
        assert_eq!(raced.current_value(), Some(2));
        pending.resolve(1);
        assert_eq!(raced.current_value(), Some(2));
    }

    #[test]
    fn race_any_rejects_with_last_error() {
        let (a, b) = (sync_source::<i32, String>(), sync_source::<i32, String>());
        let raced = race_any([a.promise(), b.promise()]);
        a.reject("E1".into());
        assert!(!raced.is_settled());
        b.reject("E2".into());
        assert_eq!(raced.current_error().as_deref(), Some("E2"));
    }

    #[test]
    fn race_any_value_beats_errors() {
        let (a, b) = (sync_source::<i32, String>(), sync_source::<i32, String>());
        let raced = race_any([a.promise(), b.promise()]);
        a.reject("E1".into());
        b.resolve(9);
        assert_eq!(raced.current_value(), Some(9));
    }

    #[test]
    fn race_any_empty_never_settles() {
        let raced = race_any(Vec::<Promise<i32, String>>::new());
        let (tx, rx) = mpsc::channel();
        raced.on_settled(move || tx.send(()).unwrap());
        assert!(rx.recv_timeout(NEVER_TIMEOUT).is_err());
    }

    #[test]
    fn either_forms() {
        let pending = sync_source::<i32, String>();
        let same = join_either(&pending.promise(), &Promise::resolved(4));
        assert_eq!(same.current_value(), Some(4));

        let left = sync_source::<i32, String>();
        let right = sync_source::<&'static str, String>();
        let tagged = race_either(&left.promise(), &right.promise());
        right.resolve("right");
        left.resolve(1);
        assert_eq!(tagged.current_value(), Some(Either::Right("right")));
    }

    #[test]
    fn finalize_all_waits_for_every_outcome() {
        let (a, b) = (sync_source::<i32, String>(), sync_source::<i32, String>());
        let done = finalize_all([a.promise(), b.promise()]);
        a.reject("failed".into());
        assert!(!done.is_settled());
        b.resolve(1);
        assert_eq!(done.value(), Some(()));
        assert!(finalize_all(Vec::<Promise<i32, String>>::new()).is_settled());
    }

    #[test]
    fn finalize_any_fires_on_first_outcome() {
        let (a, b) = (sync_source::<i32, String>(), sync_source::<i32, String>());
        let done = finalize_any([a.promise(), b.promise()]);
        b.reject("failed".into());
        assert_eq!(done.value(), Some(()));

        let never = finalize_any(Vec::<Promise<i32, String>>::new());
        assert!(!never.is_settled());
    }

    #[test]
    fn flatten_forwards_inner_result() {
        let inner = sync_source::<i32, String>();
        let outer = Promise::<Promise<i32, String>, String>::resolved(inner.promise());
        let flat = flatten(&outer);
        assert!(!flat.is_settled());
        inner.reject("inner".into());
        assert_eq!(flat.current_error().as_deref(), Some("inner"));
    }
}
