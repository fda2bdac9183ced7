mod durability_tests;
