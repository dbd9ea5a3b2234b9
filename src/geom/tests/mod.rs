mod test_bvh_basic;
mod test_intersect_basic;
