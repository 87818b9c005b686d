use futures_util::future::join_all;

use crate::pool::{BackendConnection, PoolStatus};

/// Connections to check out so that `target` (capped at `max_keep`) are open, or zero when
/// the pool already holds that many.
pub(crate) fn warm_plan(status: PoolStatus, max_keep: u32, target: Option<u32>) -> u32 {
    let target = target.unwrap_or(max_keep).min(max_keep);
    if status.connections >= target {
        return 0;
    }
    // Checked-out connections cannot be reused, so open enough beside them.
    target.saturating_sub(status.in_use())
}

/// Return warm-up connections to the pool as one concurrent group.
pub(crate) async fn close_all(conns: Vec<Box<dyn BackendConnection>>) {
    for result in join_all(conns.into_iter().map(|conn| conn.close())).await {
        if let Err(err) = result {
            tracing::warn!(error = %err, "returning warm-up connection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(connections: u32, idle: u32) -> PoolStatus {
        PoolStatus { connections, idle }
    }

    #[test]
    fn fills_the_deficit_up_to_max_keep() {
        assert_eq!(warm_plan(status(0, 0), 5, None), 5);
        assert_eq!(warm_plan(status(2, 2), 5, None), 5);
        assert_eq!(warm_plan(status(2, 1), 5, None), 4);
        assert_eq!(warm_plan(status(0, 0), 5, Some(9)), 5);
        assert_eq!(warm_plan(status(0, 0), 5, Some(3)), 3);
    }

    #[test]
    fn noop_when_already_warm() {
        assert_eq!(warm_plan(status(5, 5), 5, None), 0);
        assert_eq!(warm_plan(status(7, 0), 5, None), 0);
        assert_eq!(warm_plan(status(3, 3), 5, Some(2)), 0);
        assert_eq!(warm_plan(status(0, 0), 0, None), 0);
    }
}
