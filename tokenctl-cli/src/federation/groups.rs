//! Sync group partitioning and primary cluster selection

use tokenctl_common::{
    Cluster, Error, FederatedQueryResult, GroupCandidates, Result, SyncGroup,
};

/// Partition clusters by effective group.
///
/// Groups appear in the order their first member appears; members keep
/// configuration order.
pub fn group(clusters: &[Cluster]) -> Vec<SyncGroup> {
    let mut groups: Vec<SyncGroup> = Vec::new();

    for cluster in clusters {
        let key = cluster.effective_group();
        match groups.iter_mut().find(|g| g.name == key) {
            Some(existing) => existing.clusters.push(cluster.clone()),
            None => groups.push(SyncGroup {
                name: key.to_string(),
                clusters: vec![cluster.clone()],
            }),
        }
    }

    groups
}

/// Members of `group` holding the token, in configuration order
pub fn members_with_token<'g>(
    group: &'g SyncGroup,
    result: &FederatedQueryResult,
) -> Vec<&'g Cluster> {
    group
        .clusters
        .iter()
        .filter(|c| result.contains(&c.name))
        .collect()
}

pub fn has_token(group: &SyncGroup, result: &FederatedQueryResult) -> bool {
    group.clusters.iter().any(|c| result.contains(&c.name))
}

pub fn candidates(group: &SyncGroup, result: &FederatedQueryResult) -> GroupCandidates {
    GroupCandidates {
        group: group.name.clone(),
        clusters: members_with_token(group, result)
            .into_iter()
            .map(|c| c.name.clone())
            .collect(),
    }
}

/// The member holding the most recently updated copy of the token.
///
/// A missing update time sorts oldest; equal times keep the member that
/// comes first in configuration order.
pub fn latest_member<'g>(
    group: &'g SyncGroup,
    result: &FederatedQueryResult,
) -> Option<&'g Cluster> {
    let mut latest = None;

    for cluster in &group.clusters {
        let Some(entry) = result.get(&cluster.name) else {
            continue;
        };
        let updated = entry.token.last_update_time;
        match latest {
            Some((_, best)) if updated <= best => {}
            _ => latest = Some((cluster, updated)),
        }
    }

    latest.map(|(cluster, _)| cluster)
}

/// Determine the primary cluster of `group` for `token_name`.
///
/// Returns `Ok(None)` when no member holds the token. With
/// `enforce_affinity` unset the latest member is primary. With it set, the
/// latest copy's `cluster` hint names the primary, which may be a member
/// that no longer holds the token; a hint naming no member is an error.
pub fn primary_cluster<'g>(
    group: &'g SyncGroup,
    result: &FederatedQueryResult,
    token_name: &str,
    enforce_affinity: bool,
) -> Result<Option<&'g Cluster>> {
    let Some(latest) = latest_member(group, result) else {
        return Ok(None);
    };

    if !enforce_affinity {
        return Ok(Some(latest));
    }

    let hint = result
        .get(&latest.name)
        .and_then(|entry| entry.token.cluster.as_deref());

    match hint {
        None => Ok(Some(latest)),
        Some(hint) if latest.answers_to(hint) => Ok(Some(latest)),
        Some(hint) => match group.member_answering_to(hint) {
            Some(primary) => Ok(Some(primary)),
            None => Err(Error::UnlistedCluster {
                token: token_name.to_string(),
                hinted: hint.to_string(),
                group: group.name.clone(),
                clusters: group.cluster_names(),
                remote_names: group
                    .clusters
                    .iter()
                    .filter_map(|c| c.remote_name.clone())
                    .collect(),
            }),
        },
    }
}
