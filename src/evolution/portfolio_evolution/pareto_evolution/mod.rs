use crate::consts::NUMBER_OF_OPTIMIZATION_OBJECTIVES;
use crate::portfolio::Portfolio;
use rayon::prelude::*;
use tracing::warn;

pub(crate) mod standard_pareto;

/// Front index of every portfolio (0 is the non-dominated front).
///
/// Fast non-dominated sorting: one parallel O(N^2) pass records, for every portfolio,
/// whom it dominates and how many dominate it; fronts are then peeled by decrementing
/// those counts. Within a front, indices stay in input order.
pub fn non_dominated_ranks(portfolios: &[Portfolio]) -> Vec<usize> {
    let relations: Vec<(Vec<usize>, usize)> = portfolios
        .par_iter()
        .enumerate()
        .map(|(i, portfolio_a)| {
            let mut dominated = Vec::new();
            let mut dominated_by = 0;
            for (j, portfolio_b) in portfolios.iter().enumerate() {
                if i == j {
                    continue;
                }
                if portfolio_a.dominates(portfolio_b) {
                    dominated.push(j);
                } else if portfolio_b.dominates(portfolio_a) {
                    dominated_by += 1;
                }
            }
            (dominated, dominated_by)
        })
        .collect();
    let (dominated_sets, mut domination_counts): (Vec<Vec<usize>>, Vec<usize>) =
        relations.into_iter().unzip();

    let mut ranks: Vec<Option<usize>> = vec![None; portfolios.len()];
    let mut current_front: Vec<usize> = domination_counts
        .iter()
        .enumerate()
        .filter(|(_, count)| **count == 0)
        .map(|(i, _)| i)
        .collect();
    let mut current_rank = 0;

    while !current_front.is_empty() {
        let mut next_front = Vec::new();
        for &i in current_front.iter() {
            ranks[i] = Some(current_rank);
            for &j in dominated_sets[i].iter() {
                domination_counts[j] -= 1;
                if domination_counts[j] == 0 {
                    next_front.push(j);
                }
            }
        }
        next_front.sort_unstable();
        current_front = next_front;
        current_rank += 1;
    }

    let unranked = ranks.iter().filter(|rank| rank.is_none()).count();
    if unranked > 0 {
        // Only reachable if dominance stopped being a strict partial order (NaN objectives).
        warn!(
            unranked,
            "Found portfolios outside every front, treating them as one final front."
        );
    }
    ranks
        .into_iter()
        .map(|rank| rank.unwrap_or(current_rank))
        .collect()
}

/// Crowding distance of each front member, in front order.
///
/// Per objective the members are sorted, both extremes get an infinite distance and
/// every inner member adds the gap between its neighbours divided by the objective range.
pub fn crowding_distances(pareto_front: &[Portfolio]) -> Vec<f64> {
    let front_size = pareto_front.len();
    let mut distances = vec![0.; front_size];
    if front_size == 0 {
        return distances;
    }

    let mut order: Vec<usize> = (0..front_size).collect();
    for objective_idx in 0..NUMBER_OF_OPTIMIZATION_OBJECTIVES {
        let objective_value = |idx: usize| pareto_front[idx].objectives[objective_idx];
        order.sort_by(|&a, &b| objective_value(a).total_cmp(&objective_value(b)));

        let first = order[0];
        let last = order[front_size - 1];
        distances[first] = f64::INFINITY;
        distances[last] = f64::INFINITY;

        let range = objective_value(last) - objective_value(first);
        if range > 0.0 {
            for window in order.windows(3) {
                let (previous, current, next) = (window[0], window[1], window[2]);
                distances[current] += (objective_value(next) - objective_value(previous)) / range;
            }
        }
    }
    distances
}

pub fn calculate_and_update_crowding_distance(pareto_front: &mut [Portfolio]) {
    let distances = crowding_distances(pareto_front);
    pareto_front
        .iter_mut()
        .zip(distances)
        .for_each(|(portfolio, distance)| portfolio.crowding_distance = Some(distance));
}

/// Splits portfolios into fronts (rank order), setting rank and crowding distance on each.
pub fn build_pareto_fronts(portfolios: Vec<Portfolio>) -> Vec<Vec<Portfolio>> {
    let ranks = non_dominated_ranks(&portfolios);
    let front_count = ranks.iter().max().map_or(0, |&max_rank| max_rank + 1);

    let mut fronts: Vec<Vec<Portfolio>> = (0..front_count).map(|_| Vec::new()).collect();
    for (mut portfolio, rank) in portfolios.into_iter().zip(ranks) {
        portfolio.rank = Some(rank);
        fronts[rank].push(portfolio);
    }

    fronts
        .iter_mut()
        .for_each(|front| calculate_and_update_crowding_distance(front));
    fronts
}

/// Walks fronts in rank order keeping whole fronts while they fit; the front that
/// overflows is cut by descending crowding distance.
pub fn select_survivors(fronts: Vec<Vec<Portfolio>>, capacity: usize) -> Vec<Portfolio> {
    let mut survivors: Vec<Portfolio> = Vec::with_capacity(capacity);

    for mut front in fronts {
        if survivors.len() >= capacity {
            break;
        }
        if survivors.len() + front.len() <= capacity {
            survivors.extend(front);
        } else {
            let needed = capacity - survivors.len();
            // stable sort keeps front order among equal distances
            front.sort_by(|a, b| {
                let dist_a = a.crowding_distance.unwrap_or(f64::NEG_INFINITY);
                let dist_b = b.crowding_distance.unwrap_or(f64::NEG_INFINITY);
                dist_b.total_cmp(&dist_a)
            });
            survivors.extend(front.into_iter().take(needed));
            break;
        }
    }
    survivors
}
